//! In-memory one-way byte pipe.
//!
//! The simulator steps both boards from one thread, so it needs a line whose
//! receive side can be drained without blocking. Bytes are delivered in
//! exactly the order they were written.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

/// Create a connected transmit/receive pair.
pub fn wire() -> (WireTx, WireRx) {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    (
        WireTx {
            queue: Arc::clone(&queue),
        },
        WireRx { queue },
    )
}

/// Sending end; implements `Write` so it can sit behind a [`crate::TxLine`].
#[derive(Debug, Clone)]
pub struct WireTx {
    queue: Arc<Mutex<VecDeque<u8>>>,
}

/// Receiving end.
#[derive(Debug, Clone)]
pub struct WireRx {
    queue: Arc<Mutex<VecDeque<u8>>>,
}

impl Write for WireTx {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| std::io::Error::other("wire poisoned"))?;
        queue.extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl WireRx {
    /// Take every byte currently in flight.
    pub fn drain(&self) -> Bytes {
        match self.queue.lock() {
            Ok(mut queue) => Bytes::from(queue.drain(..).collect::<Vec<u8>>()),
            Err(_) => Bytes::new(),
        }
    }

    /// Number of bytes waiting.
    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}
