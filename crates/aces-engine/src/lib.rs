//! Engine sequencing for the ACES turbine.
//!
//! [`Sequencer`] is a resumable state machine. It is stepped once per
//! sampling window with fresh sensor readings, and commands arriving between
//! windows take effect immediately. Every wait in the start sequence is a
//! return to the caller, so a shutdown or fault can cut in at any window.

pub mod actuator;
pub mod config;
pub mod error;
pub mod sequencer;
pub mod state;

pub use actuator::{de_energize_all, Actuator, Actuators, RecordingActuators};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use sequencer::{Sample, Sequencer};
pub use state::{EngineState, FaultReason, StartStage};
