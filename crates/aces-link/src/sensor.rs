//! Sensor/actuator board (ESB) endpoint.

use std::io::Write;
use std::time::Duration;

use aces_engine::{Actuator, Actuators, EngineConfig, EngineState, Sample, Sequencer};
use aces_frame::{
    ControllerReport, Deframer, Frame, FrameSender, Inbound, LinkProfile, TelemetryRecord, ACK,
    CONNECT_REPLY, NORMAL, REPEAT,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::dispatch::{Dispatch, Dispatcher, EngineCommand};
use crate::error::Result;
use crate::supervisor::{LinkEvent, LinkState, LinkSupervisor};

/// Readings the sensor board takes itself each window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    pub hall: u16,
    pub egt: f32,
    pub esb_temp: f32,
    pub elapsed: Duration,
}

/// The ESB: runs the engine sequencer and reports telemetry to the
/// controller.
#[derive(Debug)]
pub struct SensorBoard<W, A> {
    deframer: Deframer,
    link: LinkSupervisor,
    dispatcher: Dispatcher,
    sequencer: Sequencer<A>,
    sender: FrameSender<W>,
    report: ControllerReport,
    last_sent: Option<Bytes>,
}

impl<W: Write, A: Actuators> SensorBoard<W, A> {
    pub fn new(engine: EngineConfig, link: &LinkConfig, actuators: A, out: W) -> Result<Self> {
        Ok(Self {
            deframer: Deframer::new(LinkProfile::FromController),
            link: LinkSupervisor::new("controller", link.board_timeout()),
            dispatcher: Dispatcher::new(LinkProfile::FromController),
            sequencer: Sequencer::new(engine, actuators)?,
            sender: FrameSender::new(out),
            report: ControllerReport::default(),
            last_sent: None,
        })
    }

    /// Byte-arrival handler for the controller link.
    pub fn on_byte(&mut self, byte: u8) -> Result<()> {
        match self.deframer.on_byte(byte) {
            None | Some(Inbound::Unrecognized(_)) => {}
            Some(Inbound::HandshakeProgress(index)) => self.link.on_handshake_progress(index),
            Some(Inbound::HandshakeReset { .. }) => self.link.on_handshake_reset(),
            Some(Inbound::HandshakeComplete) => {
                self.link.on_handshake_complete();
                self.sender.send_handshake(&CONNECT_REPLY)?;
            }
            Some(Inbound::Frame(frame)) => self.on_frame(&frame)?,
        }
        Ok(())
    }

    fn on_frame(&mut self, frame: &Frame) -> Result<()> {
        let dispatch = self.dispatcher.dispatch(self.link.state(), frame);
        if !matches!(dispatch, Dispatch::Ignored | Dispatch::ParityFault(_)) {
            self.link.on_valid_frame();
        }
        match dispatch {
            Dispatch::Engine(command) => {
                self.apply(command);
                self.sender.send(ACK, &[])?;
            }
            Dispatch::Report(report) => {
                self.report = report;
                self.sequencer.valid_data();
            }
            Dispatch::ParityFault(err) => {
                warn!(error = %err, "controller report rejected");
                self.sequencer.parity_failure();
            }
            Dispatch::Repeat => {
                if let Some(last) = &self.last_sent {
                    self.sender.send_raw(last)?;
                }
            }
            Dispatch::RequestRepeat => {
                self.sender.send(REPEAT, &[])?;
            }
            Dispatch::Ack | Dispatch::Telemetry(_) | Dispatch::Ignored => {}
        }
        Ok(())
    }

    fn apply(&mut self, command: EngineCommand) {
        debug!(?command, state = %self.sequencer.state(), "engine command");
        match command {
            EngineCommand::Start => {
                if let Err(err) = self.sequencer.start() {
                    info!(error = %err, "start not accepted");
                }
            }
            EngineCommand::Shutdown => self.sequencer.shutdown(),
            EngineCommand::Throttle(value) => self.sequencer.set_throttle(value),
        }
    }

    /// Periodic handler: watchdog, one sequencer step, then telemetry.
    ///
    /// A watchdog expiry forces the sequencer out of any active state and
    /// takes the place of that window's step.
    pub fn on_sample_window(&mut self, readings: &SensorReadings) -> Result<EngineState> {
        let expired = self.link.tick(readings.elapsed) == LinkEvent::Expired;
        // an expiry is this window's sequencer action
        let state = if expired {
            self.deframer.reset();
            self.sequencer.link_lost();
            self.sequencer.state()
        } else {
            let sample = Sample {
                hall: readings.hall,
                egt: readings.egt,
                mass_flow: self.report.mass_flow,
                elapsed: readings.elapsed,
            };
            self.sequencer.on_sample(&sample)
        };

        if self.deframer.take_repeat_request() {
            self.sender.send(REPEAT, &[])?;
        }
        if self.link.is_connected() {
            let record = self.telemetry(readings);
            let sent = self.sender.send(NORMAL, &record.pack())?;
            self.last_sent = Some(sent);
        }
        Ok(state)
    }

    /// The record this board would report for `readings`.
    pub fn telemetry(&self, readings: &SensorReadings) -> TelemetryRecord {
        TelemetryRecord {
            status: self.sequencer.status(),
            mass_flow: self.report.mass_flow,
            hall: readings.hall,
            egt: readings.egt,
            battery: self.report.battery,
            glow: self.sequencer.level(Actuator::GlowPlug) > 0.0,
            ecu_temp: self.report.ecu_temp,
            esb_temp: readings.esb_temp,
        }
    }

    pub fn sequencer(&self) -> &Sequencer<A> {
        &self.sequencer
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn last_report(&self) -> ControllerReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use aces_engine::{RecordingActuators, StartStage};
    use aces_frame::{decode_frame, StatusCode, CONNECT_REQUEST, STARTUP};
    use aces_transport::{wire, WireRx, WireTx};

    use super::*;

    const WINDOW: Duration = Duration::from_millis(250);

    fn board() -> (SensorBoard<WireTx, RecordingActuators>, WireRx) {
        let (tx, rx) = wire();
        let board = SensorBoard::new(
            EngineConfig::default(),
            &LinkConfig::default(),
            RecordingActuators::new(),
            tx,
        )
        .unwrap();
        (board, rx)
    }

    fn feed(board: &mut SensorBoard<WireTx, RecordingActuators>, bytes: &[u8]) {
        for &b in bytes {
            board.on_byte(b).unwrap();
        }
    }

    fn cold() -> SensorReadings {
        SensorReadings {
            hall: 0,
            egt: 20.0,
            esb_temp: 24.0,
            elapsed: WINDOW,
        }
    }

    #[test]
    fn replies_to_connect_request() {
        let (mut esb, rx) = board();
        feed(&mut esb, &CONNECT_REQUEST);
        assert_eq!(esb.link_state(), LinkState::Connected);
        assert_eq!(rx.drain().as_ref(), b"DALE");
    }

    #[test]
    fn commands_ignored_until_connected() {
        let (mut esb, rx) = board();
        feed(&mut esb, &[STARTUP]);
        assert_eq!(esb.sequencer().state(), EngineState::Idle);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn start_is_acknowledged_and_applied() {
        let (mut esb, rx) = board();
        feed(&mut esb, b"ACES");
        rx.drain();
        feed(&mut esb, b"r");
        assert_eq!(rx.drain().as_ref(), b"K");
        assert_eq!(
            esb.sequencer().state(),
            EngineState::Starting(StartStage::LockoutWait)
        );
    }

    #[test]
    fn telemetry_sent_each_window_and_repeated_on_request() {
        let (mut esb, rx) = board();
        esb.on_sample_window(&cold()).unwrap();
        assert!(rx.drain().is_empty());

        feed(&mut esb, b"ACES");
        rx.drain();
        esb.on_sample_window(&cold()).unwrap();
        let sent = rx.drain();
        let frame = decode_frame(LinkProfile::FromSensor, &sent).unwrap();
        let record = TelemetryRecord::unpack(&frame.payload).unwrap();
        assert_eq!(record.status, StatusCode::Idle);
        assert_eq!(record.esb_temp, 24.0);

        feed(&mut esb, b"R");
        assert_eq!(rx.drain(), sent);
    }

    #[test]
    fn controller_report_merged_into_telemetry() {
        let (mut esb, rx) = board();
        feed(&mut esb, b"ACES");
        let report = ControllerReport {
            mass_flow: 1.25,
            battery: 11.5,
            ecu_temp: 33.0,
        };
        feed(&mut esb, &[NORMAL]);
        feed(&mut esb, &report.pack());
        rx.drain();

        assert_eq!(esb.last_report(), report);
        let record = esb.telemetry(&cold());
        assert_eq!(record.battery, 11.5);
        assert_eq!(record.ecu_temp, 33.0);
        assert_eq!(record.mass_flow, 1.25);
    }

    #[test]
    fn corrupt_report_degrades_flow() {
        let (mut esb, _rx) = board();
        feed(&mut esb, b"ACES");
        let mut bad = ControllerReport::default().pack().to_vec();
        bad[0] ^= 0x01;
        feed(&mut esb, &[NORMAL]);
        feed(&mut esb, &bad);
        assert!(esb.sequencer().is_degraded());
    }

    #[test]
    fn unknown_opcode_requests_one_repeat() {
        let (mut esb, rx) = board();
        feed(&mut esb, b"ACES");
        rx.drain();
        feed(&mut esb, b"zzz");
        esb.on_sample_window(&cold()).unwrap();
        let sent = rx.drain();
        assert_eq!(sent[0], REPEAT);
        assert_eq!(sent[1], NORMAL);
        assert_eq!(sent.len(), 2 + 28);
    }

    #[test]
    fn watchdog_expiry_shuts_engine_down() {
        let (mut esb, _rx) = board();
        feed(&mut esb, b"ACESr");
        esb.on_sample_window(&cold()).unwrap();
        assert_eq!(
            esb.sequencer().state(),
            EngineState::Starting(StartStage::SpinUp)
        );

        for _ in 0..3 {
            esb.on_sample_window(&cold()).unwrap();
        }
        assert_eq!(esb.link_state(), LinkState::Connected);
        let state = esb.on_sample_window(&cold()).unwrap();
        assert_eq!(esb.link_state(), LinkState::Disconnected);
        assert_eq!(state, EngineState::ShuttingDown);
        assert!(esb.sequencer().actuators().all_off());
        assert_eq!(
            esb.sequencer().last_fault(),
            Some(aces_engine::FaultReason::LinkTimeout)
        );
    }
}
