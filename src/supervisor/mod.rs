//! Link supervisors for the WiFi station and the MQTT session.
//!
//! Each supervisor keeps one link alive on a best-effort basis: it is
//! called every loop iteration, reports whether the link is usable, and
//! starts a fresh connection attempt at most once per
//! [`RETRY_INTERVAL_MS`]. There is no backoff growth and no retry thread;
//! the caller's loop is the retry timer.
//!
//! ```text
//!            ensure() / gate open
//!   Down ─────────────────────────▶ Connecting
//!    ▲                                  │ driver reports connected
//!    │ driver drops / restart()         ▼
//!    └──────────────────────────────── Up
//! ```

pub mod bus;
pub mod wifi;

pub use bus::BusSupervisor;
pub use wifi::WifiSupervisor;

use crate::clock::{elapsed, has_elapsed, Timestamp, NEVER};

/// Fixed delay between connection attempts.
pub const RETRY_INTERVAL_MS: u32 = 60_000;

/// Supervisor view of a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No attempt in flight, link unusable.
    #[default]
    Down,
    /// An attempt was started and has not completed yet.
    Connecting,
    /// Link usable.
    Up,
}

impl LinkState {
    /// Lowercase name for logs and console output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LinkState::Down => "down",
            LinkState::Connecting => "connecting",
            LinkState::Up => "up",
        }
    }
}

/// Fixed-interval rate limiter for connection attempts.
///
/// `last_attempt == NEVER` lets the next attempt through immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryGate {
    last_attempt: Timestamp,
    interval_ms: u32,
}

impl Default for RetryGate {
    fn default() -> Self {
        Self::new(RETRY_INTERVAL_MS)
    }
}

impl RetryGate {
    /// Gate that has never fired.
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            last_attempt: NEVER,
            interval_ms,
        }
    }

    /// Gate with a known last attempt, for restoring or testing.
    pub const fn with_last_attempt(mut self, last_attempt: Timestamp) -> Self {
        self.last_attempt = last_attempt;
        self
    }

    /// Whether an attempt may start at `now`.
    #[inline]
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.last_attempt == NEVER || has_elapsed(now, self.last_attempt, self.interval_ms)
    }

    /// Record an attempt at `now`.
    #[inline]
    pub fn mark(&mut self, now: Timestamp) {
        self.last_attempt = now;
    }

    /// Forget the last attempt so the next check passes.
    #[inline]
    pub fn reset(&mut self) {
        self.last_attempt = NEVER;
    }

    /// Timestamp of the last attempt, [`NEVER`] if none.
    #[inline]
    pub fn last_attempt(&self) -> Timestamp {
        self.last_attempt
    }

    /// Milliseconds since the last attempt, if any.
    pub fn since_last(&self, now: Timestamp) -> Option<u32> {
        (self.last_attempt != NEVER).then(|| elapsed(now, self.last_attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_gate_is_open() {
        let gate = RetryGate::default();
        assert!(gate.is_open(12_345));
        assert_eq!(gate.since_last(12_345), None);
    }

    #[test]
    fn gate_closes_for_interval() {
        let mut gate = RetryGate::default();
        gate.mark(1_000);
        assert!(!gate.is_open(1_000));
        assert!(!gate.is_open(60_999));
        assert!(gate.is_open(61_000));
        assert_eq!(gate.since_last(31_000), Some(30_000));
    }

    #[test]
    fn gate_survives_wrap() {
        let mut gate = RetryGate::default();
        gate.mark(u32::MAX - 10_000);
        assert!(!gate.is_open(40_000));
        assert!(gate.is_open(50_000));
    }

    #[test]
    fn reset_reopens() {
        let mut gate = RetryGate::default().with_last_attempt(500);
        assert!(!gate.is_open(600));
        gate.reset();
        assert!(gate.is_open(600));
        assert_eq!(gate.last_attempt(), NEVER);
    }

    #[test]
    fn link_state_names() {
        assert_eq!(LinkState::default(), LinkState::Down);
        assert_eq!(LinkState::Up.as_str(), "up");
    }
}
