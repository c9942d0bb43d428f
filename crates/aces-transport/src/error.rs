/// Errors that can occur on a board link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying byte stream.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The far end stopped accepting bytes part way through a frame.
    #[error("link closed after {written} of {len} bytes")]
    Closed { written: usize, len: usize },

    /// A previous sender panicked while holding the transmit section.
    #[error("transmit section poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, TransportError>;
