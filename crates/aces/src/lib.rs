//! Protocol stack and engine sequencing for the ACES jet turbine.
//!
//! The engine control unit (ECU) and the engine sensor board (ESB) talk over
//! a point-to-point byte link; an operator console talks to the ECU.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte lines with atomic frame sends, in-memory wires
//! - [`frame`]: opcode framing, parity codec, telemetry layout
//! - [`engine`]: start/run/shutdown sequencer and actuator outputs
//! - [`link`]: link supervision, dispatch, board endpoints, threaded runtime

/// Re-export transport types.
pub mod transport {
    pub use aces_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use aces_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use aces_engine::*;
}

/// Re-export link types.
pub mod link {
    pub use aces_link::*;
}
