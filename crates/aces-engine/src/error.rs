use crate::state::{EngineState, FaultReason};

/// Errors returned by sequencer commands and configuration checks.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Start refused until the latched fault is acknowledged with a shutdown.
    #[error("start refused: {0} fault latched")]
    FaultLatched(FaultReason),

    /// Start is only accepted from idle.
    #[error("start refused while {0}")]
    NotIdle(EngineState),

    /// A configuration value is out of range.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
