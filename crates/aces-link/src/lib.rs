//! Link supervision, command dispatch and the two board endpoints.
//!
//! - [`LinkSupervisor`] tracks one peer's link state and watchdog.
//! - [`HandshakeInitiator`] paces the controller's connect requests.
//! - [`Dispatcher`] turns completed frames into typed actions.
//! - [`SensorBoard`] and [`ControllerBoard`] wire those together with the
//!   engine sequencer and outbound frame senders.
//! - [`runtime`] drives a board from threads: one per inbound stream plus a
//!   periodic ticker.
//!
//! Board handlers are `&mut self` methods. The runtime serializes them
//! through one mutex per board, so a byte handler never re-enters itself.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod handshake;
pub mod runtime;
pub mod sensor;
pub mod supervisor;

pub use config::LinkConfig;
pub use controller::{ControllerBoard, ControllerReadings};
pub use dispatch::{Dispatch, Dispatcher, EngineCommand};
pub use error::{HandshakeError, LinkError, Result};
pub use handshake::{HandshakeConfig, HandshakeInitiator};
pub use sensor::{SensorBoard, SensorReadings};
pub use supervisor::{LinkEvent, LinkState, LinkSupervisor};
