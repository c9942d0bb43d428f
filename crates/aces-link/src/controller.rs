//! Engine control unit (ECU) endpoint.
//!
//! The controller sits between the operator console and the sensor board.
//! Console orders are queued as sensor-board commands and resent every tick
//! until the sensor board acknowledges them.

use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;

use aces_frame::{
    ControllerReport, Deframer, Frame, FrameSender, Inbound, LinkProfile, StatusCode,
    TelemetryRecord, ACK, CONNECT_REPLY, CONNECT_REQUEST, NORMAL, REPEAT,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::dispatch::{Dispatch, Dispatcher, EngineCommand};
use crate::error::Result;
use crate::handshake::HandshakeInitiator;
use crate::supervisor::{LinkEvent, LinkState, LinkSupervisor};

/// Readings the controller takes itself each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerReadings {
    /// Fuel mass flow from the flow meter, g/s.
    pub mass_flow: f32,
    pub battery: f32,
    pub ecu_temp: f32,
    pub elapsed: Duration,
}

impl ControllerReadings {
    fn report(&self) -> ControllerReport {
        ControllerReport {
            mass_flow: self.mass_flow,
            battery: self.battery,
            ecu_temp: self.ecu_temp,
        }
    }
}

#[derive(Debug)]
struct Pending {
    command: EngineCommand,
    sends: u32,
}

/// Commands awaiting acknowledgement from the sensor board.
#[derive(Debug)]
struct Outbox {
    queue: VecDeque<Pending>,
    retries: u32,
}

impl Outbox {
    fn new(retries: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            retries,
        }
    }

    /// Shutdown replaces everything queued.
    fn push(&mut self, command: EngineCommand) {
        if command == EngineCommand::Shutdown {
            if !self.queue.is_empty() {
                debug!(dropped = self.queue.len(), "shutdown pre-empts queued commands");
            }
            self.queue.clear();
        }
        self.queue.push_back(Pending { command, sends: 0 });
    }

    /// The command to send this tick, if any.
    fn next(&mut self) -> Option<EngineCommand> {
        loop {
            let head = self.queue.front_mut()?;
            if head.sends > self.retries {
                warn!(command = ?head.command, sends = head.sends, "command never acknowledged, dropped");
                self.queue.pop_front();
                continue;
            }
            head.sends += 1;
            return Some(head.command);
        }
    }

    /// An acknowledgement only counts for a command already on the wire.
    fn acknowledge(&mut self) -> Option<EngineCommand> {
        match self.queue.front() {
            Some(head) if head.sends > 0 => self.queue.pop_front().map(|p| p.command),
            _ => None,
        }
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// The ECU: connects to the sensor board, relays console orders and
/// forwards telemetry to the console.
#[derive(Debug)]
pub struct ControllerBoard<E, C> {
    esb_rx: Deframer,
    esb_link: LinkSupervisor,
    esb_dispatch: Dispatcher,
    esb_tx: FrameSender<E>,
    initiator: HandshakeInitiator,
    console_rx: Deframer,
    console_link: LinkSupervisor,
    console_dispatch: Dispatcher,
    console_tx: FrameSender<C>,
    outbox: Outbox,
    telemetry: Option<TelemetryRecord>,
    readings: ControllerReadings,
    last_esb: Option<Bytes>,
    last_console: Option<Bytes>,
}

impl<E: Write, C: Write> ControllerBoard<E, C> {
    pub fn new(config: &LinkConfig, esb_out: E, console_out: C) -> Self {
        Self {
            esb_rx: Deframer::new(LinkProfile::FromSensor),
            esb_link: LinkSupervisor::new("sensor", config.board_timeout()),
            esb_dispatch: Dispatcher::new(LinkProfile::FromSensor),
            esb_tx: FrameSender::new(esb_out),
            initiator: HandshakeInitiator::new(config.handshake.clone()),
            console_rx: Deframer::new(LinkProfile::FromConsole),
            console_link: LinkSupervisor::new("console", config.console_timeout()),
            console_dispatch: Dispatcher::new(LinkProfile::FromConsole),
            console_tx: FrameSender::new(console_out),
            outbox: Outbox::new(config.command_retries),
            telemetry: None,
            readings: ControllerReadings::default(),
            last_esb: None,
            last_console: None,
        }
    }

    /// Byte-arrival handler for the sensor board link.
    pub fn on_esb_byte(&mut self, byte: u8) -> Result<()> {
        match self.esb_rx.on_byte(byte) {
            None | Some(Inbound::Unrecognized(_)) => {}
            Some(Inbound::HandshakeProgress(index)) => self.esb_link.on_handshake_progress(index),
            Some(Inbound::HandshakeReset { .. }) => self.esb_link.on_handshake_reset(),
            Some(Inbound::HandshakeComplete) => {
                self.esb_link.on_handshake_complete();
                self.initiator.reset();
            }
            Some(Inbound::Frame(frame)) => self.on_esb_frame(&frame)?,
        }
        Ok(())
    }

    fn on_esb_frame(&mut self, frame: &Frame) -> Result<()> {
        let dispatch = self.esb_dispatch.dispatch(self.esb_link.state(), frame);
        if !matches!(dispatch, Dispatch::Ignored | Dispatch::ParityFault(_)) {
            self.esb_link.on_valid_frame();
        }
        match dispatch {
            Dispatch::Telemetry(record) => self.telemetry = Some(record),
            Dispatch::ParityFault(err) => {
                warn!(error = %err, "telemetry rejected, queueing shutdown");
                self.outbox.push(EngineCommand::Shutdown);
            }
            Dispatch::Ack => {
                if let Some(command) = self.outbox.acknowledge() {
                    debug!(?command, "command acknowledged");
                }
            }
            Dispatch::Repeat => {
                if let Some(last) = &self.last_esb {
                    self.esb_tx.send_raw(last)?;
                }
            }
            Dispatch::RequestRepeat => {
                self.esb_tx.send(REPEAT, &[])?;
            }
            Dispatch::Engine(command) => info!(?command, "sensor board reports engine command"),
            Dispatch::Report(_) | Dispatch::Ignored => {}
        }
        Ok(())
    }

    /// Byte-arrival handler for the console link.
    pub fn on_console_byte(&mut self, byte: u8) -> Result<()> {
        match self.console_rx.on_byte(byte) {
            None | Some(Inbound::Unrecognized(_)) => {}
            Some(Inbound::HandshakeProgress(index)) => {
                self.console_link.on_handshake_progress(index)
            }
            Some(Inbound::HandshakeReset { .. }) => self.console_link.on_handshake_reset(),
            Some(Inbound::HandshakeComplete) => {
                self.console_link.on_handshake_complete();
                self.console_tx.send_handshake(&CONNECT_REPLY)?;
            }
            Some(Inbound::Frame(frame)) => self.on_console_frame(&frame)?,
        }
        Ok(())
    }

    fn on_console_frame(&mut self, frame: &Frame) -> Result<()> {
        let dispatch = self
            .console_dispatch
            .dispatch(self.console_link.state(), frame);
        if !matches!(dispatch, Dispatch::Ignored) {
            self.console_link.on_valid_frame();
        }
        match dispatch {
            Dispatch::Engine(command) => {
                info!(?command, "console order");
                self.outbox.push(command);
                self.console_tx.send(ACK, &[])?;
            }
            Dispatch::Repeat => {
                if let Some(last) = &self.last_console {
                    self.console_tx.send_raw(last)?;
                }
            }
            Dispatch::RequestRepeat => {
                self.console_tx.send(REPEAT, &[])?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Periodic handler: watchdogs, connect or report, command resend,
    /// console forwarding.
    pub fn on_tick(&mut self, readings: &ControllerReadings) -> Result<()> {
        self.readings = *readings;

        if self.esb_link.tick(readings.elapsed) == LinkEvent::Expired {
            self.esb_rx.reset();
            self.outbox.clear();
            self.telemetry = None;
        }
        if self.console_link.tick(readings.elapsed) == LinkEvent::Expired {
            self.console_rx.reset();
            if self.engine_active() {
                warn!("console lost with engine running, queueing shutdown");
                self.outbox.push(EngineCommand::Shutdown);
            }
        }

        if self.esb_rx.take_repeat_request() {
            self.esb_tx.send(REPEAT, &[])?;
        }
        if self.console_rx.take_repeat_request() {
            self.console_tx.send(REPEAT, &[])?;
        }

        match self.initiator.poll(self.esb_link.state()) {
            Ok(true) => self.esb_tx.send_handshake(&CONNECT_REQUEST)?,
            Ok(false) => {
                let report = readings.report().pack();
                self.last_esb = Some(self.esb_tx.send(NORMAL, &report)?);
                if let Some(command) = self.outbox.next() {
                    self.last_esb = Some(self.esb_tx.send_frame(&command.frame())?);
                }
            }
            Err(err) => debug!(error = %err, "not connecting to sensor board"),
        }

        if self.console_link.is_connected() {
            if let Some(record) = self.forwarded() {
                self.last_console = Some(self.console_tx.send(NORMAL, &record.pack())?);
            }
        }
        Ok(())
    }

    /// Latest telemetry with the controller's own readings filled in.
    pub fn forwarded(&self) -> Option<TelemetryRecord> {
        self.telemetry.map(|record| TelemetryRecord {
            mass_flow: self.readings.mass_flow,
            battery: self.readings.battery,
            ecu_temp: self.readings.ecu_temp,
            ..record
        })
    }

    /// Whether the last telemetry shows the engine running or starting.
    pub fn engine_active(&self) -> bool {
        self.telemetry.is_some_and(|record| {
            !matches!(
                record.status,
                StatusCode::Idle
                    | StatusCode::Cooling
                    | StatusCode::ShutdownRequested
                    | StatusCode::LinkLost
                    | StatusCode::StartupFailed
                    | StatusCode::OverSpeed
                    | StatusCode::OverTemperature
            )
        })
    }

    pub fn telemetry(&self) -> Option<TelemetryRecord> {
        self.telemetry
    }

    pub fn esb_link_state(&self) -> LinkState {
        self.esb_link.state()
    }

    pub fn console_link_state(&self) -> LinkState {
        self.console_link.state()
    }

    /// Commands still waiting for an acknowledgement.
    pub fn pending_commands(&self) -> usize {
        self.outbox.len()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.initiator.attempts()
    }
}

#[cfg(test)]
mod tests {
    use aces_frame::{decode_frame, CONSOLE_THROTTLE, ORDER, SHUTDOWN, STARTUP};
    use aces_transport::{wire, WireRx, WireTx};

    use super::*;
    use crate::handshake::HandshakeConfig;

    const TICK: Duration = Duration::from_millis(250);

    struct Rig {
        ecu: ControllerBoard<WireTx, WireTx>,
        to_esb: WireRx,
        to_console: WireRx,
    }

    fn rig(config: LinkConfig) -> Rig {
        let (esb_tx, to_esb) = wire();
        let (console_tx, to_console) = wire();
        Rig {
            ecu: ControllerBoard::new(&config, esb_tx, console_tx),
            to_esb,
            to_console,
        }
    }

    fn readings() -> ControllerReadings {
        ControllerReadings {
            mass_flow: 0.5,
            battery: 12.1,
            ecu_temp: 29.0,
            elapsed: TICK,
        }
    }

    impl Rig {
        fn esb(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.ecu.on_esb_byte(b).unwrap();
            }
        }

        fn console(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.ecu.on_console_byte(b).unwrap();
            }
        }

        fn tick(&mut self) {
            self.ecu.on_tick(&readings()).unwrap();
        }

        fn connected() -> Self {
            let mut rig = rig(LinkConfig::default());
            rig.esb(b"DALE");
            rig.console(b"ACES");
            rig.to_console.drain();
            rig
        }
    }

    fn telemetry(status: StatusCode) -> Vec<u8> {
        let record = TelemetryRecord {
            status,
            mass_flow: 0.0,
            hall: 30_000,
            egt: 400.0,
            battery: 0.0,
            glow: false,
            ecu_temp: 0.0,
            esb_temp: 35.0,
        };
        let mut bytes = vec![NORMAL];
        bytes.extend_from_slice(&record.pack());
        bytes
    }

    #[test]
    fn sends_connect_request_until_reply() {
        let mut rig = rig(LinkConfig::default());
        rig.tick();
        rig.tick();
        assert_eq!(rig.to_esb.drain().as_ref(), b"ACESACES");
        rig.esb(b"DALE");
        assert_eq!(rig.ecu.esb_link_state(), LinkState::Connected);
        rig.tick();
        let sent = rig.to_esb.drain();
        assert_eq!(sent.len(), 15);
        let frame = decode_frame(LinkProfile::FromController, &sent).unwrap();
        let report = ControllerReport::unpack(&frame.payload).unwrap();
        assert_eq!(report.battery, 12.1);
    }

    #[test]
    fn bounded_connect_attempts() {
        let mut rig = rig(LinkConfig {
            handshake: HandshakeConfig {
                max_attempts: Some(2),
            },
            ..LinkConfig::default()
        });
        for _ in 0..5 {
            rig.tick();
        }
        assert_eq!(rig.to_esb.drain().as_ref(), b"ACESACES");
        assert_eq!(rig.ecu.connect_attempts(), 2);
    }

    #[test]
    fn console_connect_and_order() {
        let mut rig = Rig::connected();
        assert_eq!(rig.ecu.console_link_state(), LinkState::Connected);
        rig.console(&[ORDER, STARTUP]);
        assert_eq!(rig.to_console.drain().as_ref(), b"K");
        assert_eq!(rig.ecu.pending_commands(), 1);

        rig.tick();
        let sent = rig.to_esb.drain();
        assert_eq!(sent.last(), Some(&STARTUP));
    }

    #[test]
    fn command_resent_until_acknowledged() {
        let mut rig = Rig::connected();
        rig.console(&[CONSOLE_THROTTLE, 77]);
        rig.tick();
        rig.tick();
        let sent = rig.to_esb.drain();
        assert_eq!(sent.iter().filter(|&&b| b == b't').count(), 2);

        rig.esb(b"K");
        assert_eq!(rig.ecu.pending_commands(), 0);
        rig.tick();
        let sent = rig.to_esb.drain();
        assert_eq!(sent.len(), 15);
    }

    #[test]
    fn ack_before_first_send_is_ignored() {
        let mut rig = Rig::connected();
        rig.console(&[ORDER, STARTUP]);
        rig.esb(b"K");
        assert_eq!(rig.ecu.pending_commands(), 1);
    }

    #[test]
    fn unacknowledged_command_dropped_after_retries() {
        let mut rig = rig(LinkConfig {
            command_retries: 2,
            ..LinkConfig::default()
        });
        rig.esb(b"DALE");
        rig.console(b"ACES");
        rig.console(&[ORDER, STARTUP]);
        for _ in 0..3 {
            rig.tick();
        }
        assert_eq!(rig.ecu.pending_commands(), 1);
        rig.tick();
        assert_eq!(rig.ecu.pending_commands(), 0);
        let sent = rig.to_esb.drain();
        assert_eq!(sent.iter().filter(|&&b| b == STARTUP).count(), 3);
    }

    #[test]
    fn shutdown_preempts_queue() {
        let mut rig = Rig::connected();
        rig.console(&[ORDER, STARTUP, CONSOLE_THROTTLE, 10, ORDER, SHUTDOWN]);
        assert_eq!(rig.ecu.pending_commands(), 1);
        rig.tick();
        assert_eq!(rig.to_esb.drain().last(), Some(&SHUTDOWN));
    }

    #[test]
    fn bad_order_asks_console_to_repeat() {
        let mut rig = Rig::connected();
        rig.console(&[ORDER, b'?']);
        assert_eq!(rig.to_console.drain().as_ref(), b"R");
        assert_eq!(rig.ecu.pending_commands(), 0);
    }

    #[test]
    fn telemetry_forwarded_with_controller_readings() {
        let mut rig = Rig::connected();
        rig.esb(&telemetry(StatusCode::AtThrottle));
        rig.tick();
        let sent = rig.to_console.drain();
        let frame = decode_frame(LinkProfile::FromSensor, &sent).unwrap();
        let record = TelemetryRecord::unpack(&frame.payload).unwrap();
        assert_eq!(record.hall, 30_000);
        assert_eq!(record.battery, 12.1);
        assert_eq!(record.mass_flow, 0.5);
        assert_eq!(record.esb_temp, 35.0);

        rig.console(b"V");
        assert_eq!(rig.to_console.drain(), sent);
    }

    #[test]
    fn corrupt_telemetry_queues_shutdown() {
        let mut rig = Rig::connected();
        let mut bytes = telemetry(StatusCode::AtThrottle);
        bytes[3] ^= 0x40;
        rig.esb(&bytes);
        assert_eq!(rig.ecu.telemetry(), None);
        rig.tick();
        assert_eq!(rig.to_esb.drain().last(), Some(&SHUTDOWN));
    }

    #[test]
    fn console_loss_with_engine_running_queues_shutdown() {
        let mut rig = Rig::connected();
        for _ in 0..5 {
            rig.esb(&telemetry(StatusCode::AtThrottle));
            rig.tick();
        }
        assert_eq!(rig.ecu.console_link_state(), LinkState::Disconnected);
        assert!(rig.ecu.engine_active());
        assert_eq!(rig.to_esb.drain().last(), Some(&SHUTDOWN));
    }

    #[test]
    fn console_loss_while_idle_is_quiet() {
        let mut rig = Rig::connected();
        for _ in 0..5 {
            rig.esb(&telemetry(StatusCode::Idle));
            rig.tick();
        }
        assert_eq!(rig.ecu.console_link_state(), LinkState::Disconnected);
        assert_eq!(rig.ecu.pending_commands(), 0);
    }

    #[test]
    fn sensor_link_loss_clears_queue() {
        let mut rig = Rig::connected();
        rig.console(&[ORDER, STARTUP]);
        for _ in 0..5 {
            rig.tick();
        }
        assert_eq!(rig.ecu.esb_link_state(), LinkState::Disconnected);
        assert_eq!(rig.ecu.pending_commands(), 0);
        assert_eq!(rig.ecu.telemetry(), None);
    }
}
