use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::handshake::HandshakeConfig;

/// Watchdog windows and retry budgets for the board links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Controller/sensor link watchdog, milliseconds.
    pub board_timeout_ms: u64,
    /// Console link watchdog, milliseconds.
    pub console_timeout_ms: u64,
    /// Ticks an unacknowledged command is resent before it is dropped.
    pub command_retries: u32,
    pub handshake: HandshakeConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            board_timeout_ms: 1000,
            console_timeout_ms: 1000,
            command_retries: 8,
            handshake: HandshakeConfig::default(),
        }
    }
}

impl LinkConfig {
    pub fn board_timeout(&self) -> Duration {
        Duration::from_millis(self.board_timeout_ms)
    }

    pub fn console_timeout(&self) -> Duration {
        Duration::from_millis(self.console_timeout_ms)
    }
}
