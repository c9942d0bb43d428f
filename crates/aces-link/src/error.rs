use aces_engine::EngineError;
use aces_frame::FrameError;

/// Errors raised by the connect initiator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// The connect request was sent `attempts` times without a reply.
    #[error("no connect reply after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

/// Errors that can occur while running a board.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A board mutex was poisoned by a panicking handler.
    #[error("board lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, LinkError>;
