//! Wrap-safe millisecond timekeeping.
//!
//! Every timestamp in the crate is a [`Timestamp`]: a 32-bit millisecond
//! counter that wraps roughly every 49.7 days. Durations are always computed
//! as `now - since` with wrapping subtraction, which yields the true elapsed
//! time as long as it is shorter than 2^32 ms.
//!
//! # Example
//!
//! ```rust
//! use relay_switch::clock::{elapsed, has_elapsed};
//!
//! // Counter wrapped between the two readings
//! assert_eq!(elapsed(5, u32::MAX), 6);
//! assert!(has_elapsed(5, u32::MAX, 6));
//! assert!(!has_elapsed(5, u32::MAX, 7));
//! ```

/// Milliseconds since boot, wrapping at 2^32.
pub type Timestamp = u32;

/// Reserved "never happened" value for retry gates.
///
/// Collides with a genuine reading only at the boot instant.
pub const NEVER: Timestamp = 0;

/// Minimum contact time for a press to count.
pub const DEBOUNCE_MS: u32 = 50;

/// Hold time at which a press becomes a long-hold.
pub const LONG_HOLD_MS: u32 = 5_000;

/// Elapsed milliseconds from `since` to `now`.
#[inline]
pub const fn elapsed(now: Timestamp, since: Timestamp) -> u32 {
    now.wrapping_sub(since)
}

/// Returns true once at least `interval` ms have passed since `since`.
#[inline]
pub const fn has_elapsed(now: Timestamp, since: Timestamp, interval: u32) -> bool {
    elapsed(now, since) >= interval
}

/// Truncates a wide monotonic counter to a [`Timestamp`].
///
/// Platform clocks usually expose 64-bit microsecond or millisecond
/// counters; keeping only the low 32 bits of the millisecond value gives the
/// wrapping behaviour the rest of the crate is written against.
#[inline]
pub const fn truncate_ms(ms: u64) -> Timestamp {
    ms as u32
}
