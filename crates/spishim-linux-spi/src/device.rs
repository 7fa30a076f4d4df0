//! Linux spidev device implementation
//!
//! This module provides the `SpiDevice` struct that drives a single
//! `/dev/spidevX.Y` node with write-only transfers.

use crate::error::{Result, SpiDevError};
use crate::transfer::{SpiIocTransfer, SpiTransport, SpidevFile};

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Device root
const DEV_ROOT: &str = "/dev";

/// Chip select used when none is given
pub const DEFAULT_CHIP_SELECT: u8 = 1;

/// Default SPI clock speed in Hz (20 MHz)
pub const DEFAULT_SPEED_HZ: u32 = 20_000_000;

/// Configuration for opening a spidev device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiDeviceConfig {
    /// SPI bus number (X in spidevX.Y)
    pub bus: u32,
    /// Chip select (Y in spidevX.Y, default: 1)
    pub chip_select: u8,
    /// SPI clock speed in Hz (default: 20 MHz)
    pub speed_hz: u32,
    /// Directory holding the device nodes (default: /dev)
    pub dev_root: PathBuf,
}

impl Default for SpiDeviceConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            chip_select: DEFAULT_CHIP_SELECT,
            speed_hz: DEFAULT_SPEED_HZ,
            dev_root: PathBuf::from(DEV_ROOT),
        }
    }
}

impl SpiDeviceConfig {
    /// Create a new configuration for the given bus and clock speed
    pub fn new(bus: u32, speed_hz: u32) -> Self {
        Self {
            bus,
            speed_hz,
            ..Default::default()
        }
    }

    /// Set the chip select
    pub fn with_chip_select(mut self, chip_select: u8) -> Self {
        self.chip_select = chip_select;
        self
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Look for device nodes under `dev_root` instead of /dev
    pub fn with_dev_root(mut self, dev_root: impl Into<PathBuf>) -> Self {
        self.dev_root = dev_root.into();
        self
    }

    /// Device node path, e.g. /dev/spidev0.1
    pub fn path(&self) -> PathBuf {
        self.dev_root.join(format!("spidev{}.{}", self.bus, self.chip_select))
    }
}

/// A write-only SPI device
///
/// Owns the device handle and a transfer descriptor that is reused for every
/// write. Clock speed and word size are fixed when the device is opened; to
/// change them, open a new `SpiDevice`. The handle is closed on drop.
pub struct SpiDevice<T: SpiTransport = SpidevFile> {
    transport: T,
    transfer: SpiIocTransfer,
    bus: u32,
    chip_select: u8,
    path: PathBuf,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
}

impl SpiDevice<SpidevFile> {
    /// Open a spidev device with the given configuration
    pub fn open(config: &SpiDeviceConfig) -> Result<Self> {
        let path = config.path();

        log::debug!("spidev: Opening device {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                log::warn!(
                    "spidev: Failed to open the spi{}.{} bus",
                    config.bus,
                    config.chip_select
                );
                SpiDevError::OpenFailed {
                    bus: config.bus,
                    chip_select: config.chip_select,
                    path: path.display().to_string(),
                    source: e,
                }
            })?;

        let dev = Self::with_transport(SpidevFile::new(file), config);

        log::info!(
            "spidev: Connected to {} (speed={} kHz)",
            path.display(),
            config.speed_hz / 1000
        );

        Ok(dev)
    }

    /// Open `/dev/spidev<bus>.1` at the given clock speed
    pub fn open_bus(bus: u32, speed_hz: u32) -> Result<Self> {
        Self::open(&SpiDeviceConfig::new(bus, speed_hz))
    }
}

impl<T: SpiTransport> SpiDevice<T> {
    /// Build a device on top of an already open transport
    pub fn with_transport(transport: T, config: &SpiDeviceConfig) -> Self {
        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "spidev: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Self {
            transport,
            transfer: SpiIocTransfer::new(config.speed_hz),
            bus: config.bus,
            chip_select: config.chip_select,
            path: config.path(),
            max_kernel_buf_size,
        }
    }

    /// Transmit `data` in a single SPI_IOC_MESSAGE(1) transfer
    ///
    /// Nothing is read back. Empty or oversized payloads are rejected before
    /// the transfer descriptor is touched.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(SpiDevError::EmptyWrite);
        }
        if u32::try_from(data.len()).is_err() {
            return Err(SpiDevError::TransferTooLarge(data.len()));
        }

        self.transfer.load_tx(data);
        log::trace!("spidev: {} write {} bytes", self.path.display(), data.len());

        self.transport
            .transfer(&self.transfer)
            .map_err(|source| SpiDevError::TransferFailed {
                len: data.len(),
                source,
            })
    }

    /// The reused transfer descriptor
    pub fn descriptor(&self) -> &SpiIocTransfer {
        &self.transfer
    }

    /// Device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// SPI bus number
    pub fn bus(&self) -> u32 {
        self.bus
    }

    /// Chip select
    pub fn chip_select(&self) -> u8 {
        self.chip_select
    }

    /// Clock speed fixed at open time
    pub fn speed_hz(&self) -> u32 {
        self.transfer.speed_hz()
    }

    /// Largest payload the kernel accepts in one transfer
    pub fn max_transfer_len(&self) -> usize {
        self.max_kernel_buf_size
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                return size;
            }
        }
        log::warn!("spidev: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("spidev: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    // SAFETY: sysconf has no preconditions
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size > 0 {
        page_size as usize
    } else {
        4096
    }
}

/// Parse device options from a list of key-value pairs
///
/// Recognised keys: `bus`, `cs`, `speed` (Hz) and `spispeed` (kHz).
pub fn parse_options(options: &[(&str, &str)]) -> Result<SpiDeviceConfig> {
    let mut config = SpiDeviceConfig::default();

    for (key, value) in options {
        match *key {
            "bus" => {
                config.bus = value.parse().map_err(|_| {
                    SpiDevError::InvalidParameter(format!("Invalid bus value: {}", value))
                })?;
            }
            "cs" => {
                config.chip_select = value.parse().map_err(|_| {
                    SpiDevError::InvalidParameter(format!("Invalid cs value: {}", value))
                })?;
            }
            "speed" => {
                config.speed_hz = value.parse().map_err(|_| {
                    SpiDevError::InvalidParameter(format!("Invalid speed value: {}", value))
                })?;
            }
            "spispeed" => {
                let speed_khz: u32 = value.parse().map_err(|_| {
                    SpiDevError::InvalidParameter(format!("Invalid spispeed value: {}", value))
                })?;
                config.speed_hz = speed_khz.checked_mul(1000).ok_or_else(|| {
                    SpiDevError::InvalidParameter(format!("spispeed too large: {}", value))
                })?;
            }
            _ => {
                log::warn!("spidev: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// What the transport saw for one transfer
    #[derive(Debug, Clone)]
    struct Sent {
        xfer: SpiIocTransfer,
        payload: Vec<u8>,
    }

    #[derive(Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<Sent>>>,
        fail_with: Option<i32>,
    }

    impl SpiTransport for Recorder {
        fn transfer(&mut self, xfer: &SpiIocTransfer) -> io::Result<()> {
            if let Some(errno) = self.fail_with {
                return Err(io::Error::from_raw_os_error(errno));
            }
            // SAFETY: the device keeps the tx buffer borrowed during transfer()
            let payload = unsafe {
                std::slice::from_raw_parts(xfer.tx_buf() as *const u8, xfer.len() as usize)
            }
            .to_vec();
            self.sent.lock().unwrap().push(Sent {
                xfer: xfer.clone(),
                payload,
            });
            Ok(())
        }
    }

    fn recorder_device(speed_hz: u32) -> (SpiDevice<Recorder>, Arc<Mutex<Vec<Sent>>>) {
        let recorder = Recorder::default();
        let sent = recorder.sent.clone();
        let dev = SpiDevice::with_transport(recorder, &SpiDeviceConfig::new(0, speed_hz));
        (dev, sent)
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("spishim-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_config_path() {
        assert_eq!(
            SpiDeviceConfig::new(0, 1_000_000).path(),
            PathBuf::from("/dev/spidev0.1")
        );
        let config = SpiDeviceConfig::new(2, 1_000_000).with_chip_select(0);
        assert_eq!(config.path(), PathBuf::from("/dev/spidev2.0"));
        let config = config.with_dev_root("/tmp/fake").with_speed(DEFAULT_SPEED_HZ);
        assert_eq!(config.path(), PathBuf::from("/tmp/fake/spidev2.0"));
        assert_eq!(config.speed_hz, 20_000_000);
    }

    #[test]
    fn test_write_issues_one_transfer() {
        let (mut dev, sent) = recorder_device(20_000_000);
        dev.write(&[0x01, 0x02, 0x03]).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].xfer.len(), 3);
        assert_eq!(sent[0].payload, vec![0x01, 0x02, 0x03]);
        assert_eq!(sent[0].xfer.rx_buf(), None);
    }

    #[test]
    fn test_open_fixes_speed_and_word_size() {
        for speed in [0, 1, 500_000, 20_000_000, u32::MAX] {
            let (mut dev, sent) = recorder_device(speed);
            assert_eq!(dev.speed_hz(), speed);
            assert_eq!(dev.descriptor().bits_per_word(), 8);
            assert_eq!(dev.descriptor().delay_usecs(), 0);

            dev.write(&[0xFF]).unwrap();
            let sent = sent.lock().unwrap();
            assert_eq!(sent[0].xfer.speed_hz(), speed);
            assert_eq!(sent[0].xfer.bits_per_word(), 8);
        }
    }

    #[test]
    fn test_sequential_writes_update_length() {
        let (mut dev, sent) = recorder_device(1_000_000);
        dev.write(&[0x24]).unwrap();
        dev.write(&[0xAB; 10]).unwrap();
        dev.write(&[0x20, 0x21]).unwrap();

        let lens: Vec<u32> = sent.lock().unwrap().iter().map(|s| s.xfer.len()).collect();
        assert_eq!(lens, vec![1, 10, 2]);
        assert_eq!(dev.descriptor().len(), 2);
    }

    #[test]
    fn test_empty_write_leaves_descriptor_alone() {
        let (mut dev, sent) = recorder_device(1_000_000);
        dev.write(&[0x10, 0x01]).unwrap();
        let before = dev.descriptor().clone();

        assert!(matches!(dev.write(&[]), Err(SpiDevError::EmptyWrite)));
        assert_eq!(dev.descriptor(), &before);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_transport_error_surfaces() {
        let recorder = Recorder {
            fail_with: Some(libc::EBUSY),
            ..Default::default()
        };
        let mut dev = SpiDevice::with_transport(recorder, &SpiDeviceConfig::new(0, 1_000_000));

        match dev.write(&[0x00; 4]) {
            Err(SpiDevError::TransferFailed { len, source }) => {
                assert_eq!(len, 4);
                assert_eq!(source.raw_os_error(), Some(libc::EBUSY));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_open_missing_bus() {
        // Never created, so nothing to clean up
        let root = std::env::temp_dir().join(format!("spishim-missing-{}", std::process::id()));
        assert!(!root.exists());
        let config = SpiDeviceConfig::new(250, 1_000_000).with_dev_root(&root);

        match SpiDevice::open(&config) {
            Err(SpiDevError::OpenFailed {
                bus,
                chip_select,
                source,
                ..
            }) => {
                assert_eq!(bus, 250);
                assert_eq!(chip_select, 1);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("opened a nonexistent bus"),
        }
    }

    #[test]
    fn test_ioctl_on_non_spidev_file_fails() {
        let root = scratch_dir("notspi");
        let config = SpiDeviceConfig::new(0, 1_000_000).with_dev_root(&root);
        std::fs::write(config.path(), b"").unwrap();

        let mut dev = SpiDevice::open(&config).unwrap();
        assert_eq!(dev.path(), config.path());
        assert_eq!(dev.bus(), 0);
        assert_eq!(dev.chip_select(), 1);
        assert!(dev.max_transfer_len() > 0);

        // A regular file rejects the spidev ioctl
        assert!(matches!(
            dev.write(&[0x01]),
            Err(SpiDevError::TransferFailed { len: 1, .. })
        ));

        drop(dev);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("bus", "1"), ("cs", "0"), ("spispeed", "4000")]).unwrap();
        assert_eq!(config.bus, 1);
        assert_eq!(config.chip_select, 0);
        assert_eq!(config.speed_hz, 4_000_000);

        let config = parse_options(&[("speed", "12345")]).unwrap();
        assert_eq!(config.bus, 0);
        assert_eq!(config.chip_select, DEFAULT_CHIP_SELECT);
        assert_eq!(config.speed_hz, 12345);
    }

    #[test]
    fn test_parse_options_rejects_garbage() {
        assert!(parse_options(&[("bus", "x")]).is_err());
        assert!(parse_options(&[("cs", "256")]).is_err());
        assert!(parse_options(&[("spispeed", "5000000")]).is_err());
    }
}
