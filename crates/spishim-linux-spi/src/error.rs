//! Error types for spidev operations

use thiserror::Error;

/// spidev specific errors
#[derive(Debug, Error)]
pub enum SpiDevError {
    /// Failed to open the spidev character device
    #[error("Failed to open the spi{bus}.{chip_select} bus ({path}): {source}")]
    OpenFailed {
        bus: u32,
        chip_select: u8,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The SPI_IOC_MESSAGE ioctl reported an error
    #[error("SPI transfer of {len} bytes failed: {source}")]
    TransferFailed {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    /// Write called with no data
    #[error("Write data cannot be empty")]
    EmptyWrite,

    /// Payload does not fit the 32-bit transfer length field
    #[error("Transfer of {0} bytes exceeds the transfer length field")]
    TransferTooLarge(usize),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for spidev operations
pub type Result<T> = std::result::Result<T, SpiDevError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failed_names_bus() {
        let err = SpiDevError::OpenFailed {
            bus: 3,
            chip_select: 1,
            path: "/dev/spidev3.1".into(),
            source: std::io::Error::from_raw_os_error(libc::ENOENT),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to open the spi3.1 bus (/dev/spidev3.1)"));
    }

    #[test]
    fn test_transfer_failed_keeps_source() {
        use std::error::Error as _;

        let err = SpiDevError::TransferFailed {
            len: 4,
            source: std::io::Error::from_raw_os_error(libc::EBUSY),
        };
        let source = err.source().unwrap();
        assert!(source.to_string().contains("busy"));
    }
}
