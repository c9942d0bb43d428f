use std::fmt;

use aces_frame::StatusCode;
use serde::Serialize;

/// Sub-stages of the start sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartStage {
    LockoutWait,
    SpinUp,
    FuelIntroduction,
    HeatSoak,
}

/// Why a shutdown or latch happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultReason {
    LinkTimeout,
    ParityFailure,
    StartupFailure,
    FuelStarvation,
    OverTemperature,
    OverSpeed,
}

impl FaultReason {
    pub fn name(self) -> &'static str {
        match self {
            FaultReason::LinkTimeout => "link-timeout",
            FaultReason::ParityFailure => "parity-failure",
            FaultReason::StartupFailure => "startup-failure",
            FaultReason::FuelStarvation => "fuel-starvation",
            FaultReason::OverTemperature => "over-temperature",
            FaultReason::OverSpeed => "over-speed",
        }
    }

    /// Telemetry status reported for this fault.
    pub fn status(self) -> StatusCode {
        match self {
            FaultReason::LinkTimeout => StatusCode::LinkLost,
            FaultReason::ParityFailure => StatusCode::ParityFailure,
            FaultReason::StartupFailure => StatusCode::StartupFailed,
            FaultReason::FuelStarvation => StatusCode::FuelNotFlowing,
            FaultReason::OverTemperature => StatusCode::OverTemperature,
            FaultReason::OverSpeed => StatusCode::OverSpeed,
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine sequence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "detail")]
pub enum EngineState {
    Idle,
    Starting(StartStage),
    Throttling,
    ShuttingDown,
    Cooling,
    FaultLatched(FaultReason),
}

impl EngineState {
    /// Starting or throttling: the states a link loss must interrupt.
    pub fn is_active(self) -> bool {
        matches!(self, EngineState::Starting(_) | EngineState::Throttling)
    }

    /// Fuel may be flowing.
    pub fn is_fuelled(self) -> bool {
        matches!(
            self,
            EngineState::Starting(StartStage::FuelIntroduction | StartStage::HeatSoak)
                | EngineState::Throttling
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Starting(StartStage::LockoutWait) => "lockout-wait",
            EngineState::Starting(StartStage::SpinUp) => "spin-up",
            EngineState::Starting(StartStage::FuelIntroduction) => "fuel-introduction",
            EngineState::Starting(StartStage::HeatSoak) => "heat-soak",
            EngineState::Throttling => "throttling",
            EngineState::ShuttingDown => "shutting-down",
            EngineState::Cooling => "cooling",
            EngineState::FaultLatched(_) => "fault-latched",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::FaultLatched(reason) => write!(f, "fault-latched({reason})"),
            other => f.write_str(other.name()),
        }
    }
}
