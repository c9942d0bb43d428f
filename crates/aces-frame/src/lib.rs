//! Opcode framing, parity codec and telemetry layout for the ACES board links.
//!
//! Every message on a board link starts with a single opcode byte. The opcode
//! fixes the payload length for the receiving link profile, so there is no
//! length prefix. Telemetry payloads carry trailing parity bytes, one per
//! 6-byte span:
//! - low nibble: popcount of span bytes 0..3, mod 16
//! - high nibble: popcount of span bytes 3..6, mod 16
//!
//! The connect handshake is a four-character literal ("ACES" from the
//! controller, "DALE" back from the sensor board) consumed byte by byte.

pub mod codec;
pub mod deframer;
pub mod error;
pub mod opcode;
pub mod parity;
pub mod telemetry;
pub mod writer;

pub use codec::{encode_frame, Frame, MAX_PAYLOAD};
pub use deframer::{decode_frame, Cursor, Deframer, Inbound};
pub use error::{FrameError, Result};
pub use opcode::{
    is_repeat, opcode_name, FrameKind, LinkProfile, ACK, CONNECT_REPLY, CONNECT_REQUEST,
    CONSOLE_THROTTLE, NORMAL, ORDER, REPEAT, REPEAT_ALT, SET_THROTTLE, SHUTDOWN, STARTUP,
};
pub use parity::{compute_parity, verify_parity, SPAN_LEN};
pub use telemetry::{ControllerReport, StatusCode, TelemetryRecord};
pub use writer::FrameSender;
