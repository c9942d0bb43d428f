use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Control constants for the start sequence and fuel loop.
///
/// Voltages are converted to duty cycles against `supply_voltage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sampling window length in milliseconds.
    pub window_ms: u64,
    /// Actuator supply voltage.
    pub supply_voltage: f32,

    /// Lockout clears once hall count and EGT are both below these.
    pub lockout_rpm: u16,
    pub lockout_egt: f32,

    pub glow_voltage: f32,
    /// Starter voltage on entry to spin-up; also the bias of the spin-up law.
    pub starter_voltage: f32,
    pub max_starter_voltage: f32,
    pub spinup_target_rpm: f32,
    pub spinup_kp: f32,
    pub spinup_kd: f32,
    /// Spin-up has settled when |rpm - target| stays below this...
    pub settle_band_rpm: f32,
    /// ...and |slope| (rpm per second) below this...
    pub settle_slope: f32,
    /// ...for this many consecutive windows.
    pub settle_samples: u32,

    pub priming_voltage: f32,
    /// Number of windows the fuel solenoid takes to ramp to full duty.
    pub fuel_steps: u32,
    /// Lube solenoid duty is fuel solenoid duty divided by this.
    pub lube_factor: f32,
    pub ignition_egt: f32,
    pub startup_rpm: f32,
    pub heat_soak_ms: u64,

    /// Mass flow at full throttle, g/s.
    pub max_flow: f32,
    /// Pump calibration: volts = pump_m * flow + pump_b.
    pub pump_m: f32,
    pub pump_b: f32,
    /// Flow meter pulses per litre.
    pub k_factor: f32,
    /// Fuel density, kg/L.
    pub fuel_density: f32,
    pub flow_tolerance: f32,

    pub cooling_voltage: f32,
    pub cooling_egt: f32,

    pub max_parity_failures: u32,
    pub max_rpm: f32,
    pub max_egt: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_ms: 250,
            supply_voltage: 9.9,
            lockout_rpm: 10,
            lockout_egt: 50.0,
            glow_voltage: 1.75,
            starter_voltage: 5.0,
            max_starter_voltage: 6.0,
            spinup_target_rpm: 10_000.0,
            spinup_kp: 0.0006,
            spinup_kd: 0.0004,
            settle_band_rpm: 500.0,
            settle_slope: 10.0,
            settle_samples: 3,
            priming_voltage: 2.0,
            fuel_steps: 20,
            lube_factor: 3.0,
            ignition_egt: 100.0,
            startup_rpm: 35_000.0,
            heat_soak_ms: 15_000,
            max_flow: 4.8,
            pump_m: 0.382_587,
            pump_b: 0.195_783,
            k_factor: 91_387.0,
            fuel_density: 0.81,
            flow_tolerance: 0.2,
            cooling_voltage: 5.0,
            cooling_egt: 100.0,
            max_parity_failures: 3,
            max_rpm: 65_000.0,
            max_egt: 700.0,
        }
    }
}

impl EngineConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn heat_soak(&self) -> Duration {
        Duration::from_millis(self.heat_soak_ms)
    }

    /// Convert a voltage to a duty cycle, clamped to `0..=1`.
    pub fn duty(&self, volts: f32) -> f32 {
        (volts / self.supply_voltage).clamp(0.0, 1.0)
    }

    /// Flow meter pulses counted in one window at 1 g/s.
    pub fn pulses_per_gps(&self) -> f32 {
        let pulses_per_gram = self.k_factor / (self.fuel_density * 1000.0);
        pulses_per_gram * self.window().as_secs_f32()
    }

    /// Pump volts per flow meter pulse of error.
    pub fn volts_per_pulse(&self) -> f32 {
        self.pump_m / self.pulses_per_gps()
    }

    /// Feed-forward pump volts for a target mass flow.
    pub fn pump_volts(&self, flow: f32) -> f32 {
        self.pump_m * flow + self.pump_b
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("window_ms", self.window_ms as f32),
            ("supply_voltage", self.supply_voltage),
            ("fuel_steps", self.fuel_steps as f32),
            ("lube_factor", self.lube_factor),
            ("k_factor", self.k_factor),
            ("fuel_density", self.fuel_density),
            ("pump_m", self.pump_m),
            ("max_flow", self.max_flow),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.settle_samples == 0 {
            return Err(EngineError::InvalidConfig(
                "settle_samples must be at least 1".to_string(),
            ));
        }
        if self.max_parity_failures == 0 {
            return Err(EngineError::InvalidConfig(
                "max_parity_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"heat_soak_ms": 2000, "max_egt": 650.0}"#).unwrap();
        assert_eq!(config.heat_soak(), Duration::from_secs(2));
        assert_eq!(config.max_egt, 650.0);
        assert_eq!(config.window_ms, 250);
    }

    #[test]
    fn zero_supply_rejected() {
        let config = EngineConfig {
            supply_voltage: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(msg)) if msg.contains("supply_voltage")
        ));
    }

    #[test]
    fn flow_meter_scaling() {
        let config = EngineConfig::default();
        // 91387 pulses/L at 0.81 kg/L over a quarter second
        let expected = 91_387.0 / 810.0 * 0.25;
        assert!((config.pulses_per_gps() - expected).abs() < 1e-3);
        // one g/s of error is worth pump_m volts
        let volts = config.volts_per_pulse() * config.pulses_per_gps();
        assert!((volts - config.pump_m).abs() < 1e-6);
    }

    #[test]
    fn duty_is_clamped() {
        let config = EngineConfig::default();
        assert_eq!(config.duty(20.0), 1.0);
        assert_eq!(config.duty(-1.0), 0.0);
        assert!((config.duty(4.95) - 0.5).abs() < 1e-6);
    }
}
