//! spishim-linux-spi - write-only Linux spidev access
//!
//! This crate opens a `/dev/spidevX.Y` character device and transmits byte
//! buffers to it, one `SPI_IOC_MESSAGE(1)` ioctl per write.
//!
//! # Overview
//!
//! The Linux SPI driver exposes SPI controllers through character devices
//! at `/dev/spidevX.Y` where X is the bus number and Y is the chip select.
//! A [`SpiDevice`] owns one such node plus a transfer descriptor whose clock
//! speed and word size (8 bits) are fixed when the device is opened. Nothing
//! is ever read back: the receive buffer of every transfer is null.
//!
//! # Example
//!
//! ```no_run
//! use spishim_linux_spi::{SpiDevice, SpiDeviceConfig};
//!
//! // /dev/spidev0.1 at 20 MHz
//! let mut spi = SpiDevice::open_bus(0, 20_000_000)?;
//! spi.write(&[0x01, 0x27, 0x01, 0x01])?;
//!
//! // Chip select 0 on bus 1
//! let config = SpiDeviceConfig::new(1, 4_000_000).with_chip_select(0);
//! let mut spi = SpiDevice::open(&config)?;
//! spi.write(&[0x12])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Threads
//!
//! `SpiDevice::write` takes `&mut self`. To write from several threads wrap
//! the device in a [`SharedSpiDevice`].
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - May require adding user to `spi` group or using udev rules

pub mod device;
pub mod error;
pub mod shared;
pub mod transfer;

// Re-exports
pub use device::{
    parse_options, SpiDevice, SpiDeviceConfig, DEFAULT_CHIP_SELECT, DEFAULT_SPEED_HZ,
};
pub use error::{Result, SpiDevError};
pub use shared::SharedSpiDevice;
pub use transfer::{SpiIocTransfer, SpiTransport, SpidevFile, BITS_PER_WORD};

/// Open a spidev device from `key=value` options
///
/// # Example Options
///
/// - `bus=0` - SPI bus number (default: 0)
/// - `cs=1` - chip select (default: 1)
/// - `speed=20000000` - clock in Hz, or `spispeed=20000` in kHz
pub fn open_spidev(options: &[(&str, &str)]) -> Result<SpiDevice> {
    let config = parse_options(options)?;
    SpiDevice::open(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_spidev_missing_node() {
        match open_spidev(&[("bus", "4000000000"), ("cs", "250")]) {
            Err(SpiDevError::OpenFailed {
                bus, chip_select, ..
            }) => {
                assert_eq!(bus, 4_000_000_000);
                assert_eq!(chip_select, 250);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("opened a nonexistent bus"),
        }
    }

    #[test]
    fn test_open_spidev_bad_option() {
        assert!(matches!(
            open_spidev(&[("speed", "fast")]),
            Err(SpiDevError::InvalidParameter(_))
        ));
    }
}
