use std::time::Duration;

use aces_frame::StatusCode;
use tracing::{debug, info, warn};

use crate::actuator::{Actuator, Actuators};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::state::{EngineState, FaultReason, StartStage};

/// Sensor readings for one sampling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Hall-effect count, taken as engine rpm.
    pub hall: u16,
    /// Exhaust gas temperature, °C.
    pub egt: f32,
    /// Latest mass flow, g/s. Ignored while flow data is degraded.
    pub mass_flow: f32,
    /// Time covered by this window.
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct SpinUp {
    prev_rpm: Option<f32>,
    settled: u32,
}

/// Engine start/run/shutdown state machine.
#[derive(Debug)]
pub struct Sequencer<A> {
    config: EngineConfig,
    actuators: A,
    levels: [f32; 5],
    state: EngineState,
    lockout: bool,
    throttle: u8,
    degraded: bool,
    parity_failures: u32,
    last_fault: Option<FaultReason>,
    shutdown_cause: Option<FaultReason>,
    starving: bool,
    spin: SpinUp,
    fuel_step: u32,
    soak: Duration,
    pump_duty: f32,
    at_target: bool,
}

impl<A: Actuators> Sequencer<A> {
    /// Create a sequencer in `Idle` with the lockout flag set.
    pub fn new(config: EngineConfig, actuators: A) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            actuators,
            levels: [0.0; 5],
            state: EngineState::Idle,
            lockout: true,
            throttle: 0,
            degraded: false,
            parity_failures: 0,
            last_fault: None,
            shutdown_cause: None,
            starving: false,
            spin: SpinUp::default(),
            fuel_step: 0,
            soak: Duration::ZERO,
            pump_duty: 0.0,
            at_target: false,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    pub fn actuators_mut(&mut self) -> &mut A {
        &mut self.actuators
    }

    /// Last level driven on `actuator`.
    pub fn level(&self, actuator: Actuator) -> f32 {
        self.levels[actuator as usize]
    }

    pub fn lockout(&self) -> bool {
        self.lockout
    }

    pub fn throttle(&self) -> u8 {
        self.throttle
    }

    pub fn last_fault(&self) -> Option<FaultReason> {
        self.last_fault
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn at_target(&self) -> bool {
        self.at_target
    }

    /// Target mass flow for the stored throttle, g/s.
    pub fn desired_flow(&self) -> f32 {
        self.config.max_flow * f32::from(self.throttle) / 255.0
    }

    /// Status byte for outgoing telemetry.
    pub fn status(&self) -> StatusCode {
        match self.state {
            EngineState::Idle => StatusCode::Idle,
            EngineState::Starting(StartStage::LockoutWait) => StatusCode::Lockout,
            EngineState::Starting(StartStage::SpinUp) => StatusCode::Starting,
            EngineState::Starting(StartStage::FuelIntroduction) if self.starving => {
                StatusCode::FuelNotFlowing
            }
            EngineState::Starting(StartStage::FuelIntroduction) => StatusCode::Starting,
            EngineState::Starting(StartStage::HeatSoak) => StatusCode::IdleReached,
            EngineState::Throttling if self.degraded => StatusCode::ParityFailure,
            EngineState::Throttling if self.at_target => StatusCode::AtThrottle,
            EngineState::Throttling => StatusCode::AdjustingThrottle,
            EngineState::ShuttingDown => self
                .shutdown_cause
                .map_or(StatusCode::ShutdownRequested, FaultReason::status),
            EngineState::Cooling => StatusCode::Cooling,
            EngineState::FaultLatched(reason) => reason.status(),
        }
    }

    /// Begin the start sequence. Only accepted from `Idle`.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            EngineState::Idle => {
                self.shutdown_cause = None;
                self.transition(EngineState::Starting(StartStage::LockoutWait));
                Ok(())
            }
            EngineState::FaultLatched(reason) => {
                warn!(fault = %reason, "start refused, fault latched");
                Err(EngineError::FaultLatched(reason))
            }
            other => Err(EngineError::NotIdle(other)),
        }
    }

    /// Stop the engine. Also acknowledges a latched fault.
    pub fn shutdown(&mut self) {
        match self.state {
            EngineState::Idle | EngineState::ShuttingDown | EngineState::Cooling => {
                debug!(state = %self.state, "shutdown ignored");
            }
            EngineState::FaultLatched(reason) => {
                info!(fault = %reason, "latched fault acknowledged");
                self.begin_shutdown(None);
            }
            _ => self.begin_shutdown(None),
        }
    }

    /// Store a throttle request (0-255). Applied at once while throttling,
    /// otherwise held until throttling begins.
    pub fn set_throttle(&mut self, throttle: u8) {
        self.throttle = throttle;
        if self.state == EngineState::Throttling {
            self.apply_throttle();
        } else {
            debug!(throttle, state = %self.state, "throttle stored");
        }
    }

    /// The peer link watchdog expired.
    pub fn link_lost(&mut self) {
        if self.state.is_active() {
            warn!(state = %self.state, "link lost, shutting down");
            self.begin_shutdown(Some(FaultReason::LinkTimeout));
        }
    }

    /// A frame carrying flow data failed its parity check.
    pub fn parity_failure(&mut self) {
        self.degraded = true;
        self.parity_failures = self.parity_failures.saturating_add(1);
        self.last_fault = Some(FaultReason::ParityFailure);
        warn!(consecutive = self.parity_failures, "parity failure, flow data degraded");
        if self.state.is_active() && self.parity_failures >= self.config.max_parity_failures {
            self.latch(FaultReason::ParityFailure);
        }
    }

    /// A frame carrying flow data passed its parity check.
    pub fn valid_data(&mut self) {
        self.degraded = false;
        self.parity_failures = 0;
    }

    /// Advance by one sampling window.
    pub fn on_sample(&mut self, sample: &Sample) -> EngineState {
        if self.state.is_fuelled() && self.check_limits(sample) {
            return self.state;
        }

        match self.state {
            EngineState::Idle => {}
            // the latch holds, but a hot engine still gets cooling air
            EngineState::FaultLatched(_) => {
                self.cooling_air(sample);
            }
            EngineState::Starting(StartStage::LockoutWait) => self.lockout_wait(sample),
            EngineState::Starting(StartStage::SpinUp) => self.spin_up(sample),
            EngineState::Starting(StartStage::FuelIntroduction) => self.fuel_introduction(sample),
            EngineState::Starting(StartStage::HeatSoak) => {
                self.soak += sample.elapsed;
                if self.soak >= self.config.heat_soak() {
                    self.enter_throttling();
                }
            }
            EngineState::Throttling => self.regulate_flow(sample),
            EngineState::ShuttingDown => {
                self.transition(EngineState::Cooling);
                self.cool(sample);
            }
            EngineState::Cooling => self.cool(sample),
        }
        self.state
    }

    fn check_limits(&mut self, sample: &Sample) -> bool {
        let rpm = f32::from(sample.hall);
        if rpm > self.config.max_rpm {
            warn!(rpm, limit = self.config.max_rpm, "overspeed");
            self.latch(FaultReason::OverSpeed);
            return true;
        }
        if sample.egt > self.config.max_egt {
            warn!(egt = sample.egt, limit = self.config.max_egt, "over temperature");
            self.latch(FaultReason::OverTemperature);
            return true;
        }
        false
    }

    fn lockout_wait(&mut self, sample: &Sample) {
        if self.lockout
            && sample.hall < self.config.lockout_rpm
            && sample.egt < self.config.lockout_egt
        {
            debug!(hall = sample.hall, egt = sample.egt, "lockout cleared");
            self.lockout = false;
        }
        if self.lockout {
            return;
        }
        self.spin = SpinUp::default();
        self.drive(Actuator::GlowPlug, self.config.duty(self.config.glow_voltage));
        self.drive(Actuator::Starter, self.config.duty(self.config.starter_voltage));
        self.transition(EngineState::Starting(StartStage::SpinUp));
    }

    fn spin_up(&mut self, sample: &Sample) {
        let cfg = &self.config;
        let rpm = f32::from(sample.hall);
        let dt = sample.elapsed.as_secs_f32();
        let slope = match self.spin.prev_rpm {
            Some(prev) if dt > 0.0 => (rpm - prev) / dt,
            _ => 0.0,
        };
        self.spin.prev_rpm = Some(rpm);

        let error = cfg.spinup_target_rpm - rpm;
        let volts = (cfg.starter_voltage + cfg.spinup_kp * error - cfg.spinup_kd * slope)
            .clamp(0.0, cfg.max_starter_voltage);
        let settled = error.abs() < cfg.settle_band_rpm && slope.abs() < cfg.settle_slope;
        let settle_samples = cfg.settle_samples;
        let duty = cfg.duty(volts);

        self.drive(Actuator::Starter, duty);
        self.spin.settled = if settled { self.spin.settled + 1 } else { 0 };
        if self.spin.settled >= settle_samples {
            self.fuel_step = 0;
            self.starving = false;
            self.drive(Actuator::FuelPump, self.config.duty(self.config.priming_voltage));
            self.transition(EngineState::Starting(StartStage::FuelIntroduction));
        }
    }

    fn fuel_introduction(&mut self, sample: &Sample) {
        if sample.egt > self.config.ignition_egt && self.level(Actuator::GlowPlug) > 0.0 {
            info!(egt = sample.egt, "ignition detected");
            self.drive(Actuator::GlowPlug, 0.0);
            self.drive(Actuator::Starter, 0.0);
        }

        // the solenoid has been open for a window once fuel_step > 0
        if self.fuel_step > 0 && !self.degraded {
            let starving = sample.mass_flow <= 0.0;
            if starving && !self.starving {
                warn!(step = self.fuel_step, "no fuel flow");
                self.last_fault = Some(FaultReason::FuelStarvation);
            }
            self.starving = starving;
        }

        if self.fuel_step >= self.config.fuel_steps {
            let rpm = f32::from(sample.hall);
            if rpm >= self.config.startup_rpm {
                self.soak = Duration::ZERO;
                self.drive(Actuator::GlowPlug, 0.0);
                self.drive(Actuator::Starter, 0.0);
                self.transition(EngineState::Starting(StartStage::HeatSoak));
            } else {
                warn!(rpm, needed = self.config.startup_rpm, "startup rpm not reached");
                self.begin_shutdown(Some(FaultReason::StartupFailure));
            }
            return;
        }

        self.fuel_step += 1;
        let duty = self.fuel_step as f32 / self.config.fuel_steps as f32;
        self.drive(Actuator::FuelSolenoid, duty);
        self.drive(Actuator::LubeSolenoid, duty / self.config.lube_factor);
    }

    fn enter_throttling(&mut self) {
        self.at_target = false;
        self.transition(EngineState::Throttling);
        self.apply_throttle();
    }

    fn apply_throttle(&mut self) {
        let desired = self.desired_flow();
        self.pump_duty = self.config.duty(self.config.pump_volts(desired));
        self.at_target = false;
        debug!(throttle = self.throttle, desired, duty = self.pump_duty, "throttle applied");
        self.drive(Actuator::FuelPump, self.pump_duty);
    }

    fn regulate_flow(&mut self, sample: &Sample) {
        if self.degraded {
            return;
        }
        let error = self.desired_flow() - sample.mass_flow;
        if error.abs() < self.config.flow_tolerance {
            self.at_target = true;
            return;
        }
        self.at_target = false;
        let pulses = error * self.config.pulses_per_gps();
        let correction = pulses * self.config.volts_per_pulse() / self.config.supply_voltage;
        self.pump_duty = (self.pump_duty + correction).clamp(0.0, 1.0);
        self.drive(Actuator::FuelPump, self.pump_duty);
    }

    fn cool(&mut self, sample: &Sample) {
        if !self.cooling_air(sample) {
            self.transition(EngineState::Idle);
        }
    }

    /// Starter blows air while EGT is above the cooling threshold. Returns
    /// whether the engine is still hot.
    fn cooling_air(&mut self, sample: &Sample) -> bool {
        let hot = sample.egt > self.config.cooling_egt;
        let duty = if hot {
            self.config.duty(self.config.cooling_voltage)
        } else {
            0.0
        };
        self.drive(Actuator::Starter, duty);
        hot
    }

    fn begin_shutdown(&mut self, cause: Option<FaultReason>) {
        self.de_energize();
        if cause.is_some() {
            self.last_fault = cause;
        }
        self.shutdown_cause = cause;
        self.transition(EngineState::ShuttingDown);
    }

    fn latch(&mut self, reason: FaultReason) {
        self.de_energize();
        self.last_fault = Some(reason);
        self.shutdown_cause = Some(reason);
        self.transition(EngineState::FaultLatched(reason));
    }

    fn de_energize(&mut self) {
        for actuator in Actuator::ALL {
            self.drive(actuator, 0.0);
        }
        self.lockout = true;
        self.throttle = 0;
        self.pump_duty = 0.0;
        self.at_target = false;
        self.starving = false;
    }

    fn drive(&mut self, actuator: Actuator, duty: f32) {
        let duty = duty.clamp(0.0, 1.0);
        self.levels[actuator as usize] = duty;
        self.actuators.drive(actuator, duty);
    }

    fn transition(&mut self, next: EngineState) {
        if next != self.state {
            info!(from = %self.state, to = %next, "engine state");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RecordingActuators;

    const WINDOW: Duration = Duration::from_millis(250);

    fn sample(hall: u16, egt: f32, mass_flow: f32) -> Sample {
        Sample {
            hall,
            egt,
            mass_flow,
            elapsed: WINDOW,
        }
    }

    fn sequencer() -> Sequencer<RecordingActuators> {
        Sequencer::new(EngineConfig::default(), RecordingActuators::new()).unwrap()
    }

    fn into_spin_up(seq: &mut Sequencer<RecordingActuators>) {
        seq.start().unwrap();
        seq.on_sample(&sample(0, 20.0, 0.0));
        assert_eq!(seq.state(), EngineState::Starting(StartStage::SpinUp));
    }

    fn into_fuel_introduction(seq: &mut Sequencer<RecordingActuators>) {
        into_spin_up(seq);
        for _ in 0..3 {
            seq.on_sample(&sample(10_000, 25.0, 0.0));
        }
        assert_eq!(seq.state(), EngineState::Starting(StartStage::FuelIntroduction));
    }

    fn into_throttling(seq: &mut Sequencer<RecordingActuators>) {
        into_fuel_introduction(seq);
        for step in 1..=21u16 {
            seq.on_sample(&sample(10_000 + step * 1_500, 150.0 + f32::from(step) * 10.0, 2.0));
        }
        assert_eq!(seq.state(), EngineState::Starting(StartStage::HeatSoak));
        for _ in 0..60 {
            seq.on_sample(&sample(45_000, 500.0, 4.7));
        }
        assert_eq!(seq.state(), EngineState::Throttling);
    }

    #[test]
    fn boots_idle_with_lockout() {
        let seq = sequencer();
        assert_eq!(seq.state(), EngineState::Idle);
        assert!(seq.lockout());
        assert_eq!(seq.status(), StatusCode::Idle);
    }

    #[test]
    fn lockout_holds_while_hot_or_spinning() {
        let mut seq = sequencer();
        seq.start().unwrap();
        assert_eq!(seq.status(), StatusCode::Lockout);
        seq.on_sample(&sample(500, 20.0, 0.0));
        seq.on_sample(&sample(0, 80.0, 0.0));
        assert_eq!(seq.state(), EngineState::Starting(StartStage::LockoutWait));
        assert!(seq.actuators().all_off());

        seq.on_sample(&sample(0, 20.0, 0.0));
        assert!(!seq.lockout());
        assert_eq!(seq.state(), EngineState::Starting(StartStage::SpinUp));
        assert!((seq.level(Actuator::GlowPlug) - 1.75 / 9.9).abs() < 1e-6);
        assert!((seq.level(Actuator::Starter) - 5.0 / 9.9).abs() < 1e-6);
    }

    #[test]
    fn spin_up_law_clamps_and_settles() {
        let mut seq = sequencer();
        into_spin_up(&mut seq);

        // far below target: law saturates at the starter maximum
        seq.on_sample(&sample(0, 20.0, 0.0));
        assert!((seq.level(Actuator::Starter) - 6.0 / 9.9).abs() < 1e-6);

        // overshoot while accelerating: law drops to zero
        seq.on_sample(&sample(20_000, 20.0, 0.0));
        assert_eq!(seq.level(Actuator::Starter), 0.0);

        // near target but still moving: not settled
        seq.on_sample(&sample(10_100, 20.0, 0.0));
        seq.on_sample(&sample(10_050, 20.0, 0.0));
        assert_eq!(seq.state(), EngineState::Starting(StartStage::SpinUp));

        for _ in 0..3 {
            seq.on_sample(&sample(10_050, 20.0, 0.0));
        }
        assert_eq!(seq.state(), EngineState::Starting(StartStage::FuelIntroduction));
        assert!((seq.level(Actuator::FuelPump) - 2.0 / 9.9).abs() < 1e-6);
    }

    #[test]
    fn fuel_ramp_uses_whole_steps() {
        let mut seq = sequencer();
        into_fuel_introduction(&mut seq);
        for _ in 0..20 {
            seq.on_sample(&sample(12_000, 60.0, 1.0));
        }
        assert_eq!(seq.level(Actuator::FuelSolenoid), 1.0);
        assert!((seq.level(Actuator::LubeSolenoid) - 1.0 / 3.0).abs() < 1e-6);
        // no ignition yet: glow plug still on
        assert!(seq.level(Actuator::GlowPlug) > 0.0);
    }

    #[test]
    fn ignition_turns_off_glow_and_starter() {
        let mut seq = sequencer();
        into_fuel_introduction(&mut seq);
        seq.on_sample(&sample(12_000, 150.0, 1.0));
        assert_eq!(seq.level(Actuator::GlowPlug), 0.0);
        assert_eq!(seq.level(Actuator::Starter), 0.0);
    }

    #[test]
    fn zero_flow_is_reported_but_not_fatal() {
        let mut seq = sequencer();
        into_fuel_introduction(&mut seq);
        seq.on_sample(&sample(12_000, 60.0, 0.0));
        seq.on_sample(&sample(12_000, 60.0, 0.0));
        assert_eq!(seq.last_fault(), Some(FaultReason::FuelStarvation));
        assert_eq!(seq.status(), StatusCode::FuelNotFlowing);
        assert_eq!(seq.state(), EngineState::Starting(StartStage::FuelIntroduction));

        seq.on_sample(&sample(12_000, 60.0, 0.5));
        assert_eq!(seq.status(), StatusCode::Starting);
    }

    #[test]
    fn startup_failure_when_rpm_short() {
        let mut seq = sequencer();
        into_fuel_introduction(&mut seq);
        for _ in 0..21 {
            seq.on_sample(&sample(20_000, 300.0, 2.0));
        }
        assert_eq!(seq.state(), EngineState::ShuttingDown);
        assert_eq!(seq.last_fault(), Some(FaultReason::StartupFailure));
        assert_eq!(seq.status(), StatusCode::StartupFailed);
        assert!(seq.actuators().all_off());
    }

    #[test]
    fn full_start_reaches_throttling() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        assert!(!matches!(seq.state(), EngineState::FaultLatched(_)));
        assert_eq!(seq.level(Actuator::GlowPlug), 0.0);
        assert_eq!(seq.level(Actuator::Starter), 0.0);
    }

    #[test]
    fn throttle_held_during_heat_soak() {
        let mut seq = sequencer();
        into_fuel_introduction(&mut seq);
        for _ in 0..21 {
            seq.on_sample(&sample(40_000, 400.0, 2.0));
        }
        assert_eq!(seq.state(), EngineState::Starting(StartStage::HeatSoak));
        let priming = seq.level(Actuator::FuelPump);

        seq.set_throttle(255);
        assert_eq!(seq.level(Actuator::FuelPump), priming);
        assert_eq!(seq.status(), StatusCode::IdleReached);

        for _ in 0..60 {
            seq.on_sample(&sample(40_000, 400.0, 2.0));
        }
        assert_eq!(seq.state(), EngineState::Throttling);
        let expected = (0.382_587 * 4.8 + 0.195_783) / 9.9;
        assert!((seq.level(Actuator::FuelPump) - expected).abs() < 1e-5);
    }

    #[test]
    fn flow_loop_corrects_and_reports_target() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.set_throttle(128);
        let desired = seq.desired_flow();
        let before = seq.level(Actuator::FuelPump);

        seq.on_sample(&sample(45_000, 500.0, desired - 1.0));
        assert_eq!(seq.status(), StatusCode::AdjustingThrottle);
        let expected = before + 0.382_587 / 9.9;
        assert!((seq.level(Actuator::FuelPump) - expected).abs() < 1e-5);

        seq.on_sample(&sample(45_000, 500.0, desired + 0.1));
        assert!(seq.at_target());
        assert_eq!(seq.status(), StatusCode::AtThrottle);
    }

    #[test]
    fn degraded_flow_is_not_used() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.set_throttle(200);
        let duty = seq.level(Actuator::FuelPump);

        seq.parity_failure();
        seq.on_sample(&sample(45_000, 500.0, 0.0));
        assert_eq!(seq.level(Actuator::FuelPump), duty);
        assert_eq!(seq.status(), StatusCode::ParityFailure);

        seq.valid_data();
        seq.on_sample(&sample(45_000, 500.0, 0.0));
        assert!(seq.level(Actuator::FuelPump) > duty);
    }

    #[test]
    fn consecutive_parity_failures_latch() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.parity_failure();
        seq.valid_data();
        seq.parity_failure();
        seq.parity_failure();
        assert_eq!(seq.state(), EngineState::Throttling);
        seq.parity_failure();
        assert_eq!(
            seq.state(),
            EngineState::FaultLatched(FaultReason::ParityFailure)
        );
        assert!(seq.actuators().all_off());
    }

    #[test]
    fn parity_failures_while_idle_do_not_latch() {
        let mut seq = sequencer();
        for _ in 0..10 {
            seq.parity_failure();
        }
        assert_eq!(seq.state(), EngineState::Idle);
        assert!(seq.is_degraded());
    }

    #[test]
    fn link_loss_while_throttling_shuts_down() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.link_lost();
        assert_eq!(seq.state(), EngineState::ShuttingDown);
        assert_eq!(seq.last_fault(), Some(FaultReason::LinkTimeout));
        assert_eq!(seq.status(), StatusCode::LinkLost);
        assert!(seq.actuators().all_off());
    }

    #[test]
    fn link_loss_while_idle_is_ignored() {
        let mut seq = sequencer();
        seq.link_lost();
        assert_eq!(seq.state(), EngineState::Idle);
        assert_eq!(seq.last_fault(), None);
    }

    #[test]
    fn shutdown_in_spin_up_is_safe() {
        let mut seq = sequencer();
        into_spin_up(&mut seq);
        seq.on_sample(&sample(5_000, 30.0, 0.0));
        seq.actuators_mut().clear_history();

        seq.shutdown();
        // every output was zeroed by the time the state is observable
        assert_eq!(seq.state(), EngineState::ShuttingDown);
        assert!(seq.actuators().all_off());
        assert_eq!(seq.actuators().history().len(), 5);
        assert!(seq.lockout());

        // late samples and commands produce no actuation before cooling
        seq.set_throttle(255);
        seq.link_lost();
        assert!(seq.start().is_err());
        assert!(seq.actuators().history().iter().all(|(_, duty)| *duty == 0.0));

        seq.on_sample(&sample(4_000, 120.0, 0.0));
        assert_eq!(seq.state(), EngineState::Cooling);
        assert!((seq.level(Actuator::Starter) - 5.0 / 9.9).abs() < 1e-6);

        seq.on_sample(&sample(2_000, 90.0, 0.0));
        assert_eq!(seq.state(), EngineState::Idle);
        assert!(seq.actuators().all_off());
    }

    #[test]
    fn overspeed_and_overtemperature_latch() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.on_sample(&sample(65_535, 500.0, 4.0));
        assert_eq!(seq.state(), EngineState::FaultLatched(FaultReason::OverSpeed));

        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.on_sample(&sample(45_000, 750.0, 4.0));
        assert_eq!(
            seq.state(),
            EngineState::FaultLatched(FaultReason::OverTemperature)
        );
        assert_eq!(seq.status(), StatusCode::OverTemperature);
    }

    #[test]
    fn latched_fault_refuses_start_until_acknowledged() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.on_sample(&sample(45_000, 800.0, 4.0));
        assert!(matches!(
            seq.start(),
            Err(EngineError::FaultLatched(FaultReason::OverTemperature))
        ));
        // latched but hot: only the starter runs, for cooling air
        seq.on_sample(&sample(40_000, 600.0, 0.0));
        assert!((seq.level(Actuator::Starter) - 5.0 / 9.9).abs() < 1e-6);
        for actuator in [
            Actuator::GlowPlug,
            Actuator::FuelPump,
            Actuator::FuelSolenoid,
            Actuator::LubeSolenoid,
        ] {
            assert_eq!(seq.level(actuator), 0.0, "{actuator}");
        }

        seq.shutdown();
        assert_eq!(seq.state(), EngineState::ShuttingDown);
        seq.on_sample(&sample(20_000, 300.0, 0.0));
        assert_eq!(seq.state(), EngineState::Cooling);
        seq.on_sample(&sample(1_000, 60.0, 0.0));
        assert_eq!(seq.state(), EngineState::Idle);
        seq.start().unwrap();
    }

    #[test]
    fn latched_overtemperature_cools_until_cold() {
        let mut seq = sequencer();
        into_throttling(&mut seq);
        seq.on_sample(&sample(45_000, 750.0, 4.7));
        assert_eq!(
            seq.state(),
            EngineState::FaultLatched(FaultReason::OverTemperature)
        );
        assert!(seq.actuators().all_off());

        // no operator action: the latch alone keeps air moving
        for _ in 0..2400 {
            seq.on_sample(&sample(30_000, 650.0, 0.0));
        }
        assert_eq!(
            seq.state(),
            EngineState::FaultLatched(FaultReason::OverTemperature)
        );
        assert!(seq.level(Actuator::Starter) > 0.0);
        assert_eq!(seq.level(Actuator::FuelPump), 0.0);

        // cold: starter stops, latch still refuses a start
        seq.on_sample(&sample(2_000, 80.0, 0.0));
        assert_eq!(seq.level(Actuator::Starter), 0.0);
        assert!(seq.actuators().all_off());
        assert!(matches!(seq.start(), Err(EngineError::FaultLatched(_))));
    }

    #[test]
    fn start_while_running_is_rejected() {
        let mut seq = sequencer();
        into_spin_up(&mut seq);
        assert!(matches!(seq.start(), Err(EngineError::NotIdle(_))));
    }
}
