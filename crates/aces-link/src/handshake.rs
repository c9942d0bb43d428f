use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::HandshakeError;
use crate::supervisor::LinkState;

/// Configuration for the connect initiator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Connect requests sent before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

/// Decides, once per tick, whether the controller sends its connect literal.
#[derive(Debug)]
pub struct HandshakeInitiator {
    config: HandshakeConfig,
    attempts: u32,
}

impl HandshakeInitiator {
    pub fn new(config: HandshakeConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Returns `Ok(true)` when a connect request should go out this tick.
    ///
    /// A connected link resets the attempt count. Once the budget is spent
    /// every poll fails until [`HandshakeInitiator::reset`].
    pub fn poll(&mut self, link: LinkState) -> Result<bool, HandshakeError> {
        if link == LinkState::Connected {
            self.attempts = 0;
            return Ok(false);
        }
        if let Some(max) = self.config.max_attempts {
            if self.attempts >= max {
                return Err(HandshakeError::AttemptsExhausted {
                    attempts: self.attempts,
                });
            }
        }
        self.attempts = self.attempts.saturating_add(1);
        if self.config.max_attempts == Some(self.attempts) {
            warn!(attempts = self.attempts, "last connect attempt");
        }
        Ok(true)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
