//! Interrupt-context button latch.
//!
//! ## Hardware
//!
//! Active-low momentary switch. The GPIO interrupt fires on both edges and
//! calls [`InputLatch::on_edge`] with the contact level and the current
//! [`Timestamp`]. Unlike a polled debouncer, the whole gesture classifier
//! runs inside the interrupt so a short press flips the relay even when the
//! main loop is stuck in a network call.
//!
//! ## Gesture detection
//!
//! | Gesture    | Held for               | Effect                          |
//! |------------|------------------------|---------------------------------|
//! | Noise      | < 50 ms                | ignored                         |
//! | ShortPress | 50 ms ..< 5000 ms      | toggle PowerState, drive relay  |
//! | LongHold   | >= 5000 ms             | toggle ConsoleGate              |
//!
//! Classification happens on release, so each press yields at most one
//! event.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::clock::{elapsed, Timestamp, DEBOUNCE_MS, LONG_HOLD_MS};
use crate::flags::SharedFlags;
use crate::traits::RelayOutput;

/// Gesture produced by a release edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonEvent {
    /// Edge did not complete a gesture.
    #[default]
    None,
    /// Deliberate press; PowerState was toggled.
    ShortPress,
    /// Held past the long-hold threshold; ConsoleGate was toggled.
    LongHold,
}

/// Classify a completed press by how long the contact was held.
#[inline]
pub const fn classify(hold_ms: u32) -> ButtonEvent {
    if hold_ms >= LONG_HOLD_MS {
        ButtonEvent::LongHold
    } else if hold_ms >= DEBOUNCE_MS {
        ButtonEvent::ShortPress
    } else {
        ButtonEvent::None
    }
}

/// Released/Pressed state machine safe to share with an ISR.
///
/// All state lives in atomics so the latch is driven through `&self`; a
/// firmware keeps it in a `static` next to its [`SharedFlags`].
#[derive(Debug, Default)]
pub struct InputLatch {
    pressed: AtomicBool,
    press_start: AtomicU32,
}

impl InputLatch {
    /// Creates a latch in the Released state.
    pub const fn new() -> Self {
        Self {
            pressed: AtomicBool::new(false),
            press_start: AtomicU32::new(0),
        }
    }

    /// Whether the latch currently considers the button held.
    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }

    /// Feed one contact edge. Call from the GPIO interrupt.
    ///
    /// `contact_low` is the line level after the edge (`true` = pressed).
    /// On a ShortPress the relay is written with the new PowerState before
    /// returning. A relay write error is dropped here; the main loop rewrites
    /// the relay on the same PowerState edge.
    pub fn on_edge<R: RelayOutput>(
        &self,
        contact_low: bool,
        now: Timestamp,
        flags: &SharedFlags,
        relay: &mut R,
    ) -> ButtonEvent {
        if contact_low {
            if !self.pressed.load(Ordering::Acquire) {
                self.press_start.store(now, Ordering::Relaxed);
                self.pressed.store(true, Ordering::Release);
            }
            return ButtonEvent::None;
        }

        if !self.pressed.swap(false, Ordering::AcqRel) {
            return ButtonEvent::None;
        }

        let hold = elapsed(now, self.press_start.load(Ordering::Relaxed));
        let event = classify(hold);
        match event {
            ButtonEvent::LongHold => {
                flags.toggle_console();
            }
            ButtonEvent::ShortPress => {
                let on = flags.toggle_power();
                // No logging in interrupt context; the main loop rewrites the relay
                relay.set_energized(on).ok();
            }
            ButtonEvent::None => {}
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockRelay;

    fn press(latch: &InputLatch, flags: &SharedFlags, relay: &mut MockRelay, at: u32, hold: u32) -> ButtonEvent {
        assert_eq!(latch.on_edge(true, at, flags, relay), ButtonEvent::None);
        latch.on_edge(false, at.wrapping_add(hold), flags, relay)
    }

    #[test]
    fn classify_thresholds() {
        assert_eq!(classify(0), ButtonEvent::None);
        assert_eq!(classify(49), ButtonEvent::None);
        assert_eq!(classify(50), ButtonEvent::ShortPress);
        assert_eq!(classify(4_999), ButtonEvent::ShortPress);
        assert_eq!(classify(5_000), ButtonEvent::LongHold);
        assert_eq!(classify(u32::MAX), ButtonEvent::LongHold);
    }

    #[test]
    fn bounce_is_ignored() {
        let latch = InputLatch::new();
        let flags = SharedFlags::new();
        let mut relay = MockRelay::new();

        assert_eq!(press(&latch, &flags, &mut relay, 100, 49), ButtonEvent::None);
        assert!(!flags.power());
        assert!(!flags.console());
        assert_eq!(relay.writes, 0);
    }

    #[test]
    fn short_press_toggles_power_and_drives_relay() {
        let latch = InputLatch::new();
        let flags = SharedFlags::new();
        let mut relay = MockRelay::new();

        assert_eq!(press(&latch, &flags, &mut relay, 100, 50), ButtonEvent::ShortPress);
        assert!(flags.power());
        assert!(relay.energized);
        assert_eq!(relay.writes, 1);

        assert_eq!(press(&latch, &flags, &mut relay, 1_000, 4_999), ButtonEvent::ShortPress);
        assert!(!flags.power());
        assert!(!relay.energized);
        assert!(!flags.console());
    }

    #[test]
    fn relay_fault_still_toggles_power() {
        let latch = InputLatch::new();
        let flags = SharedFlags::new();
        let mut relay = MockRelay::new();
        relay.fail = true;

        assert_eq!(press(&latch, &flags, &mut relay, 100, 200), ButtonEvent::ShortPress);
        assert!(flags.power());
        assert_eq!(relay.writes, 1);
        assert!(!relay.energized);
    }

    #[test]
    fn long_hold_toggles_console_only() {
        let latch = InputLatch::new();
        let flags = SharedFlags::new();
        let mut relay = MockRelay::new();

        assert_eq!(press(&latch, &flags, &mut relay, 0, 5_000), ButtonEvent::LongHold);
        assert!(flags.console());
        assert!(!flags.power());
        assert_eq!(relay.writes, 0);

        assert_eq!(press(&latch, &flags, &mut relay, 10_000, 12_000), ButtonEvent::LongHold);
        assert!(!flags.console());
    }

    #[test]
    fn long_hold_ignores_concurrent_power_changes() {
        let latch = InputLatch::new();
        let flags = SharedFlags::new();
        let mut relay = MockRelay::new();

        latch.on_edge(true, 0, &flags, &mut relay);
        flags.set_power(true); // remote command lands mid-hold
        assert_eq!(latch.on_edge(false, 6_000, &flags, &mut relay), ButtonEvent::LongHold);
        assert!(flags.console());
        assert!(flags.power());
    }

    #[test]
    fn hold_measured_across_wrap() {
        let latch = InputLatch::new();
        let flags = SharedFlags::new();
        let mut relay = MockRelay::new();

        assert_eq!(
            press(&latch, &flags, &mut relay, u32::MAX - 20, 100),
            ButtonEvent::ShortPress
        );
        assert!(flags.power());
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let latch = InputLatch::new();
        let flags = SharedFlags::new();
        let mut relay = MockRelay::new();

        // Release without press
        assert_eq!(latch.on_edge(false, 10, &flags, &mut relay), ButtonEvent::None);

        // Second falling edge must not restart the hold timer
        latch.on_edge(true, 0, &flags, &mut relay);
        latch.on_edge(true, 4_000, &flags, &mut relay);
        assert_eq!(latch.on_edge(false, 5_000, &flags, &mut relay), ButtonEvent::LongHold);

        // Release after release
        assert_eq!(latch.on_edge(false, 5_100, &flags, &mut relay), ButtonEvent::None);
        assert!(!latch.is_pressed());
    }
}
