//! First-order turbine plant for the simulator.
//!
//! Good enough to exercise the start sequence end to end: the starter and
//! combustion both pull rpm toward a target through one spool lag, and EGT
//! follows fuel flow while lit.

use std::time::Duration;

use aces_engine::{Actuator, Actuators, EngineConfig};
use aces_link::{ControllerReadings, SensorReadings};

/// rpm per starter volt.
const STARTER_GAIN: f32 = 2000.0;
/// rpm per g/s of burning fuel.
const COMBUSTION_GAIN: f32 = 12_000.0;
/// EGT rise per g/s of burning fuel.
const EGT_GAIN: f32 = 130.0;
const AMBIENT: f32 = 20.0;
const SPOOL_TAU: f32 = 1.54;
const EGT_TAU: f32 = 2.0;
/// EGT time constant while the starter blows cold air through.
const COOLING_TAU: f32 = 1.0;
/// Below this flow the flame goes out.
const FLAMEOUT_FLOW: f32 = 0.05;
const BATTERY: f32 = 12.6;

/// Actuator levels as the plant sees them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlantInputs {
    levels: [f32; 5],
}

impl PlantInputs {
    pub fn level(&self, actuator: Actuator) -> f32 {
        self.levels[actuator as usize]
    }
}

impl Actuators for PlantInputs {
    fn drive(&mut self, actuator: Actuator, duty: f32) {
        self.levels[actuator as usize] = duty;
    }
}

#[derive(Debug, Clone)]
pub struct Plant {
    supply: f32,
    pump_m: f32,
    pump_b: f32,
    rpm: f32,
    egt: f32,
    flow: f32,
    lit: bool,
    starter: f32,
}

impl Plant {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            supply: config.supply_voltage,
            pump_m: config.pump_m,
            pump_b: config.pump_b,
            rpm: 0.0,
            egt: AMBIENT,
            flow: 0.0,
            lit: false,
            starter: 0.0,
        }
    }

    /// Advance the plant by `dt` under `inputs`.
    pub fn advance(&mut self, dt: Duration, inputs: &PlantInputs) {
        let dt = dt.as_secs_f32();
        let pump_volts = inputs.level(Actuator::FuelPump) * self.supply;
        self.flow = if pump_volts > self.pump_b {
            (pump_volts - self.pump_b) / self.pump_m * inputs.level(Actuator::FuelSolenoid)
        } else {
            0.0
        };
        if self.flow <= FLAMEOUT_FLOW {
            self.lit = false;
        } else if inputs.level(Actuator::GlowPlug) > 0.0 {
            self.lit = true;
        }
        self.starter = inputs.level(Actuator::Starter) * self.supply;

        let burning = if self.lit { self.flow } else { 0.0 };
        let rpm_target = STARTER_GAIN * self.starter + COMBUSTION_GAIN * burning;
        self.rpm += lag(dt, SPOOL_TAU) * (rpm_target - self.rpm);

        let egt_target = AMBIENT + EGT_GAIN * burning;
        let tau = if !self.lit && self.starter > 0.0 {
            COOLING_TAU
        } else {
            EGT_TAU
        };
        self.egt += lag(dt, tau) * (egt_target - self.egt);
    }

    pub fn sensor_readings(&self, elapsed: Duration) -> SensorReadings {
        SensorReadings {
            hall: self.rpm.round().clamp(0.0, f32::from(u16::MAX)) as u16,
            egt: self.egt,
            esb_temp: AMBIENT + 10.0,
            elapsed,
        }
    }

    pub fn controller_readings(&self, elapsed: Duration) -> ControllerReadings {
        ControllerReadings {
            mass_flow: self.flow,
            // starter draw sags the battery
            battery: BATTERY - 0.15 * self.starter,
            ecu_temp: AMBIENT + 8.0,
            elapsed,
        }
    }

    pub fn rpm(&self) -> f32 {
        self.rpm
    }

    pub fn egt(&self) -> f32 {
        self.egt
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

fn lag(dt: f32, tau: f32) -> f32 {
    1.0 - (-dt / tau).exp()
}
