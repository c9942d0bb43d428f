//! Scripted operator console: connect, start, throttle, run, stop.
//!
//! The console reacts to the telemetry the controller forwards, so the same
//! script drives both the stepped and the threaded simulation.

use std::time::Duration;

use aces_frame::{
    Deframer, Frame, Inbound, LinkProfile, StatusCode, TelemetryRecord, ACK, CONNECT_REQUEST,
    CONSOLE_THROTTLE, NORMAL, ORDER, SHUTDOWN, STARTUP,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Starting,
    Running { since: Duration },
    Stopping,
    Done,
}

/// One line of the simulation timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub t_ms: u64,
    pub event: String,
    pub status: &'static str,
    pub rpm: u16,
    pub egt: f32,
    pub mass_flow: f32,
    pub glow: bool,
}

#[derive(Debug)]
pub struct ScriptedConsole {
    rx: Deframer,
    phase: Phase,
    throttle: u8,
    run_for: Duration,
    throttle_sent: bool,
    reached_throttle: bool,
    fault: Option<StatusCode>,
    last: Option<TelemetryRecord>,
    timeline: Vec<TimelineEntry>,
}

impl ScriptedConsole {
    pub fn new(throttle: u8, run_for: Duration) -> Self {
        Self {
            // console inbound carries the same opcodes as the sensor link
            rx: Deframer::new(LinkProfile::FromSensor),
            phase: Phase::Connecting,
            throttle,
            run_for,
            throttle_sent: false,
            reached_throttle: false,
            fault: None,
            last: None,
            timeline: Vec::new(),
        }
    }

    /// Periodic call; returns bytes for the controller.
    pub fn poll(&mut self, now: Duration) -> Vec<u8> {
        match self.phase {
            Phase::Connecting => CONNECT_REQUEST.to_vec(),
            Phase::Running { since } if now.saturating_sub(since) >= self.run_for => {
                self.phase = Phase::Stopping;
                self.order(now, "stop", &[ORDER, SHUTDOWN])
            }
            _ => Vec::new(),
        }
    }

    /// Feed bytes received from the controller; returns bytes to send back.
    pub fn on_bytes(&mut self, now: Duration, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &byte in bytes {
            match self.rx.on_byte(byte) {
                Some(Inbound::HandshakeComplete) if self.phase == Phase::Connecting => {
                    info!("console connected");
                    self.record(now, "connected".to_string());
                    self.phase = Phase::Starting;
                    out.extend(self.order(now, "start", &[ORDER, STARTUP]));
                }
                Some(Inbound::Frame(frame)) => out.extend(self.on_frame(now, &frame)),
                _ => {}
            }
        }
        out
    }

    fn on_frame(&mut self, now: Duration, frame: &Frame) -> Vec<u8> {
        if frame.opcode != NORMAL {
            return Vec::new();
        }
        let record = match TelemetryRecord::unpack(&frame.payload) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "console dropped telemetry");
                return Vec::new();
            }
        };
        let changed = self.last.map(|last| last.status) != Some(record.status);
        self.last = Some(record);
        if changed {
            self.record(now, "status".to_string());
        }

        let mut out = vec![ACK];
        match (self.phase, record.status) {
            (
                Phase::Starting | Phase::Running { .. },
                StatusCode::StartupFailed
                | StatusCode::OverSpeed
                | StatusCode::OverTemperature
                | StatusCode::LinkLost,
            ) => {
                warn!(status = record.status.name(), "engine fault");
                self.fault = Some(record.status);
                self.phase = Phase::Stopping;
                // a shutdown acknowledges a latched fault
                out.extend(self.order(now, "acknowledge", &[ORDER, SHUTDOWN]));
            }
            (Phase::Starting, StatusCode::IdleReached) if !self.throttle_sent => {
                self.throttle_sent = true;
                let throttle = self.throttle;
                out.extend(self.order(now, "throttle", &[CONSOLE_THROTTLE, throttle]));
            }
            (Phase::Starting, StatusCode::AdjustingThrottle | StatusCode::AtThrottle) => {
                self.reached_throttle = true;
                self.phase = Phase::Running { since: now };
            }
            (Phase::Stopping, StatusCode::Idle) => {
                self.record(now, "done".to_string());
                self.phase = Phase::Done;
            }
            _ => {}
        }
        out
    }

    fn order(&mut self, now: Duration, what: &str, bytes: &[u8]) -> Vec<u8> {
        self.record(now, format!("console {what}"));
        bytes.to_vec()
    }

    fn record(&mut self, now: Duration, event: String) {
        let (status, rpm, egt, mass_flow, glow) = match self.last {
            Some(r) => (r.status.name(), r.hall, r.egt, r.mass_flow, r.glow),
            None => ("-", 0, 0.0, 0.0, false),
        };
        self.timeline.push(TimelineEntry {
            t_ms: now.as_millis() as u64,
            event,
            status,
            rpm,
            egt,
            mass_flow,
            glow,
        });
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// The run reached throttle and came back to idle without a fault.
    pub fn succeeded(&self) -> bool {
        self.is_done() && self.reached_throttle && self.fault.is_none()
    }

    pub fn fault(&self) -> Option<StatusCode> {
        self.fault
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }
}
