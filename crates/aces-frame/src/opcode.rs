//! Opcode bytes and per-link opcode tables.
//!
//! The same byte can mean different things on different links ('N' is
//! telemetry coming from the sensor board but a controller report going to
//! it), so classification always goes through a [`LinkProfile`].

use crate::telemetry::{REPORT_PAYLOAD_LEN, TELEMETRY_PAYLOAD_LEN};

/// Shutdown request.
pub const SHUTDOWN: u8 = b'S';
/// Startup request.
pub const STARTUP: u8 = b'r';
/// Set throttle, controller to sensor board. One byte, 0-255 scale.
pub const SET_THROTTLE: u8 = b't';
/// Normal data: telemetry or controller report depending on direction.
pub const NORMAL: u8 = b'N';
/// Acknowledge.
pub const ACK: u8 = b'K';
/// Repeat the last message.
pub const REPEAT: u8 = b'R';
/// Repeat, as sent by older consoles.
pub const REPEAT_ALT: u8 = b'V';
/// Console order; payload byte is 'S' or 'r'.
pub const ORDER: u8 = b'O';
/// Set throttle, console to controller.
pub const CONSOLE_THROTTLE: u8 = b'T';

/// Connect request literal.
pub const CONNECT_REQUEST: [u8; 4] = *b"ACES";
/// Connect reply literal.
pub const CONNECT_REPLY: [u8; 4] = *b"DALE";

/// What an opcode byte starts on a given link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// First byte of a handshake literal; the rest must follow in order.
    Handshake(&'static [u8; 4]),
    /// A frame carrying exactly this many payload bytes.
    Payload(usize),
}

/// Which opcode table applies to an inbound byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkProfile {
    /// Sensor board receiving from the controller.
    FromController,
    /// Controller receiving from the sensor board.
    FromSensor,
    /// Controller receiving from the operator console.
    FromConsole,
}

impl LinkProfile {
    /// Classify an opcode byte, or `None` when it has no meaning here.
    pub fn classify(self, opcode: u8) -> Option<FrameKind> {
        match self {
            LinkProfile::FromController => match opcode {
                b'A' => Some(FrameKind::Handshake(&CONNECT_REQUEST)),
                SHUTDOWN | STARTUP | ACK | REPEAT | REPEAT_ALT => Some(FrameKind::Payload(0)),
                SET_THROTTLE => Some(FrameKind::Payload(1)),
                NORMAL => Some(FrameKind::Payload(REPORT_PAYLOAD_LEN)),
                _ => None,
            },
            LinkProfile::FromSensor => match opcode {
                b'D' => Some(FrameKind::Handshake(&CONNECT_REPLY)),
                SHUTDOWN | ACK | REPEAT | REPEAT_ALT => Some(FrameKind::Payload(0)),
                NORMAL => Some(FrameKind::Payload(TELEMETRY_PAYLOAD_LEN)),
                _ => None,
            },
            LinkProfile::FromConsole => match opcode {
                b'A' => Some(FrameKind::Handshake(&CONNECT_REQUEST)),
                ACK | REPEAT | REPEAT_ALT => Some(FrameKind::Payload(0)),
                ORDER | CONSOLE_THROTTLE => Some(FrameKind::Payload(1)),
                _ => None,
            },
        }
    }

    /// The literal this link expects from its peer when connecting.
    pub fn handshake(self) -> &'static [u8; 4] {
        match self {
            LinkProfile::FromController | LinkProfile::FromConsole => &CONNECT_REQUEST,
            LinkProfile::FromSensor => &CONNECT_REPLY,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LinkProfile::FromController => "controller",
            LinkProfile::FromSensor => "sensor",
            LinkProfile::FromConsole => "console",
        }
    }
}

/// Returns true for either repeat opcode.
pub fn is_repeat(opcode: u8) -> bool {
    opcode == REPEAT || opcode == REPEAT_ALT
}

/// Returns a human-readable name for an opcode byte.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        SHUTDOWN => "SHUTDOWN",
        STARTUP => "STARTUP",
        SET_THROTTLE | CONSOLE_THROTTLE => "THROTTLE",
        NORMAL => "NORMAL",
        ACK => "ACK",
        REPEAT | REPEAT_ALT => "REPEAT",
        ORDER => "ORDER",
        b'A' | b'D' => "CONNECT",
        _ => "UNKNOWN",
    }
}
