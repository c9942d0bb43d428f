/// Errors that can occur while building or reading frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A parity byte does not match its 6-byte span.
    #[error("parity mismatch in span {span} (carried {carried:#04x}, computed {computed:#04x})")]
    Parity { span: usize, carried: u8, computed: u8 },

    /// Fewer bytes than the layout requires.
    #[error("truncated frame ({actual} bytes, need {expected})")]
    Truncated { expected: usize, actual: usize },

    /// The telemetry status byte is not a known code.
    #[error("unknown status code {0}")]
    UnknownStatus(u8),

    /// The opcode has no meaning on this link profile.
    #[error("opcode {opcode:#04x} is not valid on the {profile} link")]
    UnknownOpcode { opcode: u8, profile: &'static str },

    /// The byte run ended before a frame completed.
    #[error("incomplete frame (cursor {0})")]
    Incomplete(String),

    /// The payload exceeds the largest frame on any link.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The outbound line failed.
    #[error("transport error: {0}")]
    Transport(#[from] aces_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
