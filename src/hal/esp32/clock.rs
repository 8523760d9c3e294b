//! ESP32 clock implementation using the ESP-IDF timer.

use crate::clock::{truncate_ms, Timestamp};
use crate::traits::Clock;

/// Milliseconds since boot, wrapped to a [`Timestamp`].
///
/// `esp_timer_get_time` is safe to call from interrupt context, so the
/// button handler uses this too.
#[inline]
pub fn uptime_ms() -> Timestamp {
    // Plain read of the hardware timer, no side effects
    let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
    truncate_ms((micros / 1000) as u64)
}

/// ESP32 clock using the hardware timer.
///
/// # Example
///
/// ```ignore
/// use relay_switch::hal::esp32::Esp32Clock;
/// use relay_switch::traits::Clock;
///
/// let clock = Esp32Clock::new();
/// let start = clock.now_ms();
/// // ... do work ...
/// let elapsed = relay_switch::elapsed(clock.now_ms(), start);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates a new ESP32 clock instance.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> Timestamp {
        uptime_ms()
    }
}
