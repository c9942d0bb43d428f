//! Thread-per-stream board runtime.
//!
//! Each inbound stream gets a receiver thread that hands bytes to the board
//! one at a time, and a ticker thread calls the periodic handler. Both take
//! the board mutex for every call. All threads stop when `running` is
//! cleared; receivers notice on their next read timeout.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{LinkError, Result};

const READ_CHUNK_SIZE: usize = 64;

/// Spawn a thread that feeds every byte read from `stream` to `on_byte`.
///
/// The thread exits cleanly when the peer closes the stream or `running`
/// is cleared, and returns the first handler or read error otherwise.
pub fn spawn_receiver<B, R, F>(
    name: &str,
    mut stream: R,
    board: Arc<Mutex<B>>,
    running: Arc<AtomicBool>,
    mut on_byte: F,
) -> Result<JoinHandle<Result<()>>>
where
    B: Send + 'static,
    R: Read + Send + 'static,
    F: FnMut(&mut B, u8) -> Result<()> + Send + 'static,
{
    let label = name.to_string();
    let handle = thread::Builder::new()
        .name(format!("{name}-rx"))
        .spawn(move || {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            while running.load(Ordering::Acquire) {
                let read = match stream.read(&mut chunk) {
                    Ok(0) => {
                        debug!(link = %label, "peer closed stream");
                        return Ok(());
                    }
                    Ok(n) => n,
                    Err(err)
                        if matches!(
                            err.kind(),
                            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                        ) =>
                    {
                        continue
                    }
                    Err(err) => return Err(LinkError::Io(err)),
                };
                trace!(link = %label, len = read, "bytes received");
                let mut board = lock(&board)?;
                for &byte in &chunk[..read] {
                    on_byte(&mut board, byte)?;
                }
            }
            Ok(())
        })?;
    Ok(handle)
}

/// Spawn a thread that calls `on_tick` every `period` with the time since
/// the previous call.
pub fn spawn_ticker<B, F>(
    name: &str,
    period: Duration,
    board: Arc<Mutex<B>>,
    running: Arc<AtomicBool>,
    mut on_tick: F,
) -> Result<JoinHandle<Result<()>>>
where
    B: Send + 'static,
    F: FnMut(&mut B, Duration) -> Result<()> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("{name}-tick"))
        .spawn(move || {
            let mut last = Instant::now();
            loop {
                thread::sleep(period);
                if !running.load(Ordering::Acquire) {
                    return Ok(());
                }
                let now = Instant::now();
                let elapsed = now.duration_since(last);
                last = now;
                let mut board = lock(&board)?;
                on_tick(&mut board, elapsed)?;
            }
        })?;
    Ok(handle)
}

fn lock<B>(board: &Mutex<B>) -> Result<MutexGuard<'_, B>> {
    board.lock().map_err(|_| LinkError::Poisoned)
}
