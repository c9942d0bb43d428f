use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::opcode::opcode_name;
use crate::telemetry::TELEMETRY_PAYLOAD_LEN;

/// Largest payload any link profile accepts (the telemetry frame).
pub const MAX_PAYLOAD: usize = TELEMETRY_PAYLOAD_LEN;

/// A complete frame: opcode plus its fixed-length payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The opcode byte.
    pub opcode: u8,
    /// The payload, parity bytes included for 'N' frames.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// A frame with no payload.
    pub fn bare(opcode: u8) -> Self {
        Self::new(opcode, Bytes::new())
    }

    /// The total wire size of this frame (opcode + payload).
    pub fn wire_size(&self) -> usize {
        1 + self.payload.len()
    }

    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬──────────────────────────────────────┐
/// │ Opcode (1B) │ Payload (length fixed by the opcode) │
/// └─────────────┴──────────────────────────────────────┘
/// ```
pub fn encode_frame(opcode: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(1 + payload.len());
    dst.put_u8(opcode);
    dst.put_slice(payload);
    Ok(())
}
