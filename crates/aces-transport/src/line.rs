use std::io::{ErrorKind, Write};
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use crate::error::{Result, TransportError};

/// Transmit side of a board link.
///
/// Each [`TxLine::transmit`] call holds the line lock for the whole byte run,
/// which stands in for the interrupt-disabled section the firmware used
/// around every outbound frame.
pub struct TxLine<T> {
    inner: Mutex<T>,
}

impl<T: Write> TxLine<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Send every byte of `bytes` without letting another sender interleave.
    pub fn transmit(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.lock()?;
        let mut offset = 0usize;
        while offset < bytes.len() {
            match guard.write(&bytes[offset..]) {
                Ok(0) => {
                    return Err(TransportError::Closed {
                        written: offset,
                        len: bytes.len(),
                    })
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match guard.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        trace!(len = bytes.len(), "transmitted");
        Ok(())
    }

    /// Consume the line and return the writer.
    pub fn into_inner(self) -> Result<T> {
        self.inner.into_inner().map_err(|_| TransportError::Poisoned)
    }

    fn lock(&self) -> Result<MutexGuard<'_, T>> {
        self.inner.lock().map_err(|_| TransportError::Poisoned)
    }
}

impl<T> std::fmt::Debug for TxLine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxLine").finish_non_exhaustive()
    }
}
