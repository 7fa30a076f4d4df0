//! Thread-safe handle to a `SpiDevice`

use crate::device::SpiDevice;
use crate::error::Result;
use crate::transfer::{SpiTransport, SpidevFile};

use std::sync::{Arc, Mutex, MutexGuard};

/// A `SpiDevice` that can be written from several threads
///
/// The lock is held from the moment the transfer descriptor is filled until
/// the ioctl returns, so each transfer carries its own buffer and length.
pub struct SharedSpiDevice<T: SpiTransport = SpidevFile> {
    inner: Arc<Mutex<SpiDevice<T>>>,
}

impl<T: SpiTransport> Clone for SharedSpiDevice<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SpiTransport> SharedSpiDevice<T> {
    /// Wrap an open device
    pub fn new(device: SpiDevice<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    /// Transmit `data` in a single transfer, serialised against other writers
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.lock().write(data)
    }

    /// Lock the device for a sequence of writes
    pub fn lock(&self) -> MutexGuard<'_, SpiDevice<T>> {
        // A panic in another writer leaves the descriptor in a valid state
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: SpiTransport> From<SpiDevice<T>> for SharedSpiDevice<T> {
    fn from(device: SpiDevice<T>) -> Self {
        Self::new(device)
    }
}
