//! Frame interpretation per link.

use aces_frame::{
    is_repeat, opcode_name, ControllerReport, Frame, FrameError, LinkProfile, TelemetryRecord,
    ACK, CONSOLE_THROTTLE, NORMAL, ORDER, SET_THROTTLE, SHUTDOWN, STARTUP,
};
use tracing::debug;

use crate::supervisor::LinkState;

/// Engine-level request carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start,
    Shutdown,
    Throttle(u8),
}

impl EngineCommand {
    /// The controller-to-sensor frame for this command.
    pub fn frame(self) -> Frame {
        match self {
            EngineCommand::Start => Frame::bare(STARTUP),
            EngineCommand::Shutdown => Frame::bare(SHUTDOWN),
            EngineCommand::Throttle(value) => Frame::new(SET_THROTTLE, vec![value]),
        }
    }
}

/// What the receiving board should do with a frame.
#[derive(Debug)]
pub enum Dispatch {
    Engine(EngineCommand),
    Ack,
    /// The peer asked for the last message again.
    Repeat,
    Telemetry(TelemetryRecord),
    Report(ControllerReport),
    /// The data frame failed to decode; its content must not be used.
    ParityFault(FrameError),
    /// The frame was well-formed but its content was not understood; ask the
    /// peer to resend.
    RequestRepeat,
    /// Not honoured in the current link state.
    Ignored,
}

/// Decodes frames from one inbound link.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    profile: LinkProfile,
}

impl Dispatcher {
    pub fn new(profile: LinkProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> LinkProfile {
        self.profile
    }

    /// Interpret `frame`. Only a connected link is listened to.
    pub fn dispatch(&self, link: LinkState, frame: &Frame) -> Dispatch {
        if link != LinkState::Connected {
            debug!(
                link = self.profile.name(),
                opcode = opcode_name(frame.opcode),
                state = %link,
                "frame ignored before connect"
            );
            return Dispatch::Ignored;
        }

        match (self.profile, frame.opcode) {
            (_, ACK) => Dispatch::Ack,
            (_, opcode) if is_repeat(opcode) => Dispatch::Repeat,

            (LinkProfile::FromController, SHUTDOWN) => Dispatch::Engine(EngineCommand::Shutdown),
            (LinkProfile::FromController, STARTUP) => Dispatch::Engine(EngineCommand::Start),
            (LinkProfile::FromController, SET_THROTTLE) => match first_byte(frame) {
                Some(value) => Dispatch::Engine(EngineCommand::Throttle(value)),
                None => Dispatch::RequestRepeat,
            },
            (LinkProfile::FromController, NORMAL) => {
                match ControllerReport::unpack(&frame.payload) {
                    Ok(report) => Dispatch::Report(report),
                    Err(err) => Dispatch::ParityFault(err),
                }
            }

            (LinkProfile::FromSensor, NORMAL) => match TelemetryRecord::unpack(&frame.payload) {
                Ok(record) => Dispatch::Telemetry(record),
                Err(err) => Dispatch::ParityFault(err),
            },
            (LinkProfile::FromSensor, SHUTDOWN) => Dispatch::Engine(EngineCommand::Shutdown),

            (LinkProfile::FromConsole, ORDER) => match first_byte(frame) {
                Some(SHUTDOWN) => Dispatch::Engine(EngineCommand::Shutdown),
                Some(STARTUP) => Dispatch::Engine(EngineCommand::Start),
                _ => Dispatch::RequestRepeat,
            },
            (LinkProfile::FromConsole, CONSOLE_THROTTLE) => match first_byte(frame) {
                Some(value) => Dispatch::Engine(EngineCommand::Throttle(value)),
                None => Dispatch::RequestRepeat,
            },

            _ => Dispatch::RequestRepeat,
        }
    }
}

fn first_byte(frame: &Frame) -> Option<u8> {
    frame.payload.first().copied()
}
