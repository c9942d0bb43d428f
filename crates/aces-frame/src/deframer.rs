//! Byte-at-a-time receive state machine.
//!
//! The deframer is fed from the byte-arrival handler and never blocks. At
//! most one frame is in flight; completed frames are handed out as owned
//! values and the accumulation buffer never leaves this module.

use bytes::{BufMut, BytesMut};

use crate::codec::{Frame, MAX_PAYLOAD};
use crate::error::{FrameError, Result};
use crate::opcode::{FrameKind, LinkProfile};

/// Where the deframer is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    AwaitingOpcode,
    AwaitingPayload { opcode: u8, remaining: usize },
    /// `index` is the next literal byte expected.
    AwaitingHandshake { index: usize },
}

/// What a single byte produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete frame.
    Frame(Frame),
    /// The handshake literal matched up to `index` bytes.
    HandshakeProgress(usize),
    /// The whole handshake literal arrived.
    HandshakeComplete,
    /// A byte broke the handshake literal and was discarded.
    HandshakeReset { got: u8, index: usize },
    /// An opcode with no meaning on this link; a repeat request is latched.
    Unrecognized(u8),
}

/// Incremental frame decoder for one inbound link.
#[derive(Debug)]
pub struct Deframer {
    profile: LinkProfile,
    cursor: Cursor,
    buf: BytesMut,
    repeat_requested: bool,
}

impl Deframer {
    pub fn new(profile: LinkProfile) -> Self {
        Self {
            profile,
            cursor: Cursor::AwaitingOpcode,
            buf: BytesMut::with_capacity(MAX_PAYLOAD),
            repeat_requested: false,
        }
    }

    /// Feed one received byte.
    ///
    /// Returns `None` while a frame or handshake is still being accumulated.
    pub fn on_byte(&mut self, byte: u8) -> Option<Inbound> {
        match self.cursor {
            Cursor::AwaitingOpcode => self.on_opcode(byte),
            Cursor::AwaitingPayload { opcode, remaining } => {
                self.buf.put_u8(byte);
                if remaining > 1 {
                    self.cursor = Cursor::AwaitingPayload {
                        opcode,
                        remaining: remaining - 1,
                    };
                    return None;
                }
                self.cursor = Cursor::AwaitingOpcode;
                let payload = self.buf.split().freeze();
                Some(Inbound::Frame(Frame::new(opcode, payload)))
            }
            Cursor::AwaitingHandshake { index } => {
                let literal = self.profile.handshake();
                if byte != literal[index] {
                    tracing::debug!(
                        link = self.profile.name(),
                        got = byte,
                        index,
                        "handshake byte mismatch, progress reset"
                    );
                    self.cursor = Cursor::AwaitingOpcode;
                    return Some(Inbound::HandshakeReset { got: byte, index });
                }
                let next = index + 1;
                if next == literal.len() {
                    self.cursor = Cursor::AwaitingOpcode;
                    Some(Inbound::HandshakeComplete)
                } else {
                    self.cursor = Cursor::AwaitingHandshake { index: next };
                    Some(Inbound::HandshakeProgress(next))
                }
            }
        }
    }

    fn on_opcode(&mut self, byte: u8) -> Option<Inbound> {
        match self.profile.classify(byte) {
            Some(FrameKind::Payload(0)) => Some(Inbound::Frame(Frame::bare(byte))),
            Some(FrameKind::Payload(len)) => {
                self.buf.clear();
                self.cursor = Cursor::AwaitingPayload {
                    opcode: byte,
                    remaining: len,
                };
                None
            }
            // the opening byte is literal[0]
            Some(FrameKind::Handshake(_)) => {
                self.cursor = Cursor::AwaitingHandshake { index: 1 };
                Some(Inbound::HandshakeProgress(1))
            }
            None => {
                tracing::debug!(
                    link = self.profile.name(),
                    opcode = byte,
                    "unrecognized opcode, requesting repeat"
                );
                self.repeat_requested = true;
                Some(Inbound::Unrecognized(byte))
            }
        }
    }

    /// Abandon any partial frame or handshake.
    pub fn reset(&mut self) {
        self.cursor = Cursor::AwaitingOpcode;
        self.buf.clear();
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn profile(&self) -> LinkProfile {
        self.profile
    }

    /// Clear and return the latched repeat request.
    pub fn take_repeat_request(&mut self) -> bool {
        std::mem::take(&mut self.repeat_requested)
    }
}

/// Decode exactly one frame from a complete byte run.
///
/// Handshake literals decode to a bare frame carrying the literal's first
/// byte. Trailing bytes after the frame are an error.
pub fn decode_frame(profile: LinkProfile, bytes: &[u8]) -> Result<Frame> {
    let mut deframer = Deframer::new(profile);
    let mut frame = None;
    for (at, &byte) in bytes.iter().enumerate() {
        let produced = match deframer.on_byte(byte) {
            None | Some(Inbound::HandshakeProgress(_)) => None,
            Some(Inbound::Frame(frame)) => Some(frame),
            Some(Inbound::HandshakeComplete) => Some(Frame::bare(profile.handshake()[0])),
            Some(Inbound::Unrecognized(opcode)) => {
                return Err(FrameError::UnknownOpcode {
                    opcode,
                    profile: profile.name(),
                })
            }
            Some(Inbound::HandshakeReset { index, .. }) => {
                return Err(FrameError::Incomplete(format!(
                    "handshake broken at byte {index}"
                )))
            }
        };
        if let Some(done) = produced {
            if at + 1 != bytes.len() {
                return Err(FrameError::PayloadTooLarge {
                    size: bytes.len() - 1,
                    max: done.payload.len(),
                });
            }
            frame = Some(done);
        }
    }
    frame.ok_or_else(|| FrameError::Incomplete(format!("{:?}", deframer.cursor())))
}
