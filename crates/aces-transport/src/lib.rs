//! Byte-line abstraction for the ACES board links.
//!
//! The boards only ever need two primitives from a physical link: "send these
//! raw bytes" and "a byte arrived". This crate provides:
//! - [`TxLine`], a transmit side whose every send is one mutual-exclusion
//!   section, so the bytes of one frame are never interleaved with another
//! - [`SerialStream`], a connected `Read + Write` byte stream
//! - [`wire`], an in-memory one-way byte pipe for simulations and tests
//!
//! This is the lowest layer. Register-level UART/SPI access lives outside the
//! workspace and plugs in as any `std::io::Write` / `std::io::Read`.

pub mod error;
pub mod line;
pub mod traits;
pub mod wire;

pub use error::{Result, TransportError};
pub use line::TxLine;
pub use traits::SerialStream;
pub use wire::{wire, WireRx, WireTx};
