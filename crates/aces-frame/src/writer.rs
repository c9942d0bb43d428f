use std::io::Write;

use aces_transport::TxLine;
use bytes::{Bytes, BytesMut};

use crate::codec::{encode_frame, Frame};
use crate::error::Result;
use crate::opcode::opcode_name;

/// Writes complete frames to a board link.
///
/// Encoding happens outside the line lock; the encoded bytes go out in one
/// [`TxLine::transmit`] so frames from different senders never interleave.
pub struct FrameSender<T> {
    line: TxLine<T>,
}

impl<T: Write> FrameSender<T> {
    pub fn new(inner: T) -> Self {
        Self {
            line: TxLine::new(inner),
        }
    }

    /// Encode and send a frame. Returns the bytes that went out, so the
    /// caller can keep them for a later repeat.
    pub fn send(&self, opcode: u8, payload: &[u8]) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(1 + payload.len());
        encode_frame(opcode, payload, &mut buf)?;
        self.line.transmit(&buf)?;
        tracing::trace!(opcode = opcode_name(opcode), len = payload.len(), "frame sent");
        Ok(buf.freeze())
    }

    pub fn send_frame(&self, frame: &Frame) -> Result<Bytes> {
        self.send(frame.opcode, &frame.payload)
    }

    /// Send already-encoded bytes, such as a stored frame being repeated.
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.line.transmit(bytes)?;
        Ok(())
    }

    /// Send a four-byte connect literal.
    pub fn send_handshake(&self, literal: &[u8; 4]) -> Result<()> {
        self.send_raw(literal)
    }

    /// Borrow the underlying line.
    pub fn line(&self) -> &TxLine<T> {
        &self.line
    }

    /// Consume the sender and return the inner writer.
    pub fn into_inner(self) -> Result<T> {
        Ok(self.line.into_inner()?)
    }
}

impl<T> std::fmt::Debug for FrameSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSender").finish_non_exhaustive()
    }
}
