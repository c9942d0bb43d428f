use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

/// Connection state of one peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// Handshake bytes matched so far.
    Handshaking(usize),
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => f.write_str("disconnected"),
            LinkState::Handshaking(progress) => write!(f, "handshaking({progress})"),
            LinkState::Connected => f.write_str("connected"),
        }
    }
}

/// Outcome of a watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Steady,
    /// The watchdog ran out; the link is now `Disconnected`.
    Expired,
}

/// Link state and watchdog for one peer.
///
/// Only handshake bytes and watchdog expiry change the state. Valid frames
/// only feed the watchdog.
#[derive(Debug)]
pub struct LinkSupervisor {
    name: &'static str,
    timeout: Duration,
    state: LinkState,
    quiet: Duration,
}

impl LinkSupervisor {
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            timeout,
            state: LinkState::Disconnected,
            quiet: Duration::ZERO,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Advance the watchdog by `elapsed`.
    pub fn tick(&mut self, elapsed: Duration) -> LinkEvent {
        if self.state == LinkState::Disconnected {
            return LinkEvent::Steady;
        }
        self.quiet += elapsed;
        if self.quiet > self.timeout {
            warn!(
                link = self.name,
                state = %self.state,
                quiet_ms = self.quiet.as_millis() as u64,
                "link watchdog expired"
            );
            self.state = LinkState::Disconnected;
            self.quiet = Duration::ZERO;
            return LinkEvent::Expired;
        }
        LinkEvent::Steady
    }

    pub fn on_handshake_complete(&mut self) {
        if self.state != LinkState::Connected {
            info!(link = self.name, "link connected");
        }
        self.state = LinkState::Connected;
        self.quiet = Duration::ZERO;
    }

    pub fn on_valid_frame(&mut self) {
        self.quiet = Duration::ZERO;
    }

    /// A connected link stays connected while the peer re-sends its literal.
    pub fn on_handshake_progress(&mut self, index: usize) {
        if self.state == LinkState::Connected {
            return;
        }
        if self.state == LinkState::Disconnected {
            self.quiet = Duration::ZERO;
        }
        self.state = LinkState::Handshaking(index);
    }

    pub fn on_handshake_reset(&mut self) {
        if let LinkState::Handshaking(progress) = self.state {
            debug!(link = self.name, progress, "handshake abandoned");
            self.state = LinkState::Disconnected;
            self.quiet = Duration::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(250);

    fn connected() -> LinkSupervisor {
        let mut link = LinkSupervisor::new("test", Duration::from_secs(1));
        link.on_handshake_complete();
        link
    }

    #[test]
    fn starts_disconnected_and_never_expires() {
        let mut link = LinkSupervisor::new("test", Duration::from_secs(1));
        for _ in 0..10 {
            assert_eq!(link.tick(WINDOW), LinkEvent::Steady);
        }
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn expires_after_window_without_frames() {
        let mut link = connected();
        for _ in 0..4 {
            assert_eq!(link.tick(WINDOW), LinkEvent::Steady);
        }
        // exactly one second is still inside the window
        assert!(link.is_connected());
        assert_eq!(link.tick(WINDOW), LinkEvent::Expired);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert_eq!(link.tick(WINDOW), LinkEvent::Steady);
    }

    #[test]
    fn valid_frames_feed_watchdog() {
        let mut link = connected();
        for _ in 0..20 {
            assert_eq!(link.tick(WINDOW), LinkEvent::Steady);
            link.on_valid_frame();
        }
        assert!(link.is_connected());
    }

    #[test]
    fn stalled_handshake_expires() {
        let mut link = LinkSupervisor::new("test", Duration::from_secs(1));
        link.on_handshake_progress(1);
        link.on_handshake_progress(2);
        assert_eq!(link.state(), LinkState::Handshaking(2));
        link.tick(Duration::from_millis(1500));
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn reset_returns_to_disconnected() {
        let mut link = LinkSupervisor::new("test", Duration::from_secs(1));
        link.on_handshake_progress(1);
        link.on_handshake_reset();
        assert_eq!(link.state(), LinkState::Disconnected);

        let mut link = connected();
        link.on_handshake_progress(1);
        link.on_handshake_reset();
        assert!(link.is_connected());
    }
}
