//! Transfer descriptor and the ioctl transport beneath it

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// Linux spidev ioctl constants
mod ioctl {
    use super::SpiIocTransfer;
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)]).
    // Declaring the pointee as one SpiIocTransfer encodes the same size field
    // as SPI_IOC_MESSAGE(1).
    ioctl_write_ptr!(spi_ioc_message_1, SPI_IOC_MAGIC, 0, SpiIocTransfer);
}

/// Size of the kernel's struct spi_ioc_transfer
pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

/// Word size used for every transfer
pub const BITS_PER_WORD: u8 = 8;

/// SPI transfer structure for ioctl
///
/// This must match the kernel's struct spi_ioc_transfer layout. One instance
/// is owned by each [`SpiDevice`](crate::SpiDevice) and refilled on every write.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

const _: () = assert!(std::mem::size_of::<SpiIocTransfer>() == SPI_IOC_TRANSFER_SIZE);

impl SpiIocTransfer {
    /// Descriptor with the fixed per-device parameters filled in
    pub(crate) fn new(speed_hz: u32) -> Self {
        Self {
            speed_hz,
            bits_per_word: BITS_PER_WORD,
            delay_usecs: 0,
            ..Default::default()
        }
    }

    /// Point the descriptor at `data` for a transmit-only transfer
    ///
    /// The caller guarantees `data.len()` fits in `u32`.
    pub(crate) fn load_tx(&mut self, data: &[u8]) {
        self.tx_buf = data.as_ptr() as u64;
        self.rx_buf = 0;
        self.len = data.len() as u32;
    }

    /// Transmit buffer address (0 before the first write)
    pub fn tx_buf(&self) -> u64 {
        self.tx_buf
    }

    /// Receive buffer address, `None` for write-only transfers
    pub fn rx_buf(&self) -> Option<u64> {
        (self.rx_buf != 0).then_some(self.rx_buf)
    }

    /// Transfer length in bytes
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no payload has been loaded
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clock speed in Hz
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Delay after the transfer in microseconds
    pub fn delay_usecs(&self) -> u16 {
        self.delay_usecs
    }

    /// Bits per word
    pub fn bits_per_word(&self) -> u8 {
        self.bits_per_word
    }
}

/// Something that can submit a single spi_ioc_transfer
///
/// [`SpidevFile`] is the kernel-backed implementation. Tests and alternative
/// backends plug in here to drive [`SpiDevice`](crate::SpiDevice) without
/// hardware.
pub trait SpiTransport: Send {
    /// Submit one transfer; the buffers referenced by `xfer` are valid for
    /// the duration of the call.
    fn transfer(&mut self, xfer: &SpiIocTransfer) -> io::Result<()>;
}

/// An open `/dev/spidevX.Y` file
#[derive(Debug)]
pub struct SpidevFile {
    file: File,
}

impl SpidevFile {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

impl SpiTransport for SpidevFile {
    fn transfer(&mut self, xfer: &SpiIocTransfer) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        // SAFETY: `xfer` is a valid spi_ioc_transfer and its tx buffer is
        // borrowed by the caller for the duration of this call.
        unsafe {
            ioctl::spi_ioc_message_1(fd, xfer)
                .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        }
        Ok(())
    }
}
