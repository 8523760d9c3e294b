//! Hardware abstraction traits for the relay, status LED, clock and storage.
//!
//! These traits let the switch logic run against ESP32 peripherals or the
//! desktop mocks in [`crate::hal::mock`] without change.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`RelayOutput`] | Digital line driving the power relay |
//! | [`StatusLed`] | Connectivity blink indicator |
//! | [`Clock`] | Wrapping millisecond time source |
//! | [`SettingsStore`] | Durable storage for the settings record |
//!
//! # Example
//!
//! ```rust
//! use relay_switch::traits::RelayOutput;
//! use relay_switch::hal::MockRelay;
//!
//! let mut relay = MockRelay::new();
//! relay.set_energized(true).unwrap();
//! assert!(relay.energized);
//! ```

use crate::clock::Timestamp;

/// Relay output line.
///
/// `true` energizes the relay. Implementations used from the button
/// interrupt must be cheap and must not block or allocate.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use relay_switch::traits::RelayOutput;
///
/// struct GpioRelay { pin: i32 }
///
/// impl RelayOutput for GpioRelay {
///     type Error = ();
///
///     fn set_energized(&mut self, on: bool) -> Result<(), ()> {
///         // write the GPIO level...
///         Ok(())
///     }
/// }
/// ```
pub trait RelayOutput {
    /// Error type for relay writes.
    type Error: core::fmt::Debug;

    /// Drive the relay line.
    fn set_energized(&mut self, on: bool) -> Result<(), Self::Error>;
}

/// Single status LED used as a connectivity indicator.
pub trait StatusLed {
    /// Turn the LED on or off.
    fn set_lit(&mut self, lit: bool);
}

/// Time source returning a wrapping millisecond counter.
///
/// # Example
///
/// ```rust
/// use relay_switch::traits::Clock;
/// use relay_switch::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// clock.set(u32::MAX);
/// clock.advance(6);
/// assert_eq!(clock.now_ms(), 5);
/// ```
pub trait Clock {
    /// Milliseconds since boot, wrapping at 2^32.
    fn now_ms(&self) -> Timestamp;
}

/// Durable storage for the fixed-size settings record.
///
/// The store only moves bytes; validating the record header is the job of
/// [`crate::settings::Settings::decode`].
pub trait SettingsStore {
    /// Error type for storage operations.
    type Error: core::fmt::Debug;

    /// Read the stored record into `buf`, returning the number of bytes read.
    ///
    /// Returns `Ok(0)` when nothing has been stored yet.
    fn load(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Replace the stored record.
    fn save(&mut self, record: &[u8]) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingRelay {
        on: bool,
        writes: usize,
    }

    impl RelayOutput for CountingRelay {
        type Error = ();

        fn set_energized(&mut self, on: bool) -> Result<(), ()> {
            self.on = on;
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn relay_trait_object_usable() {
        let mut relay = CountingRelay {
            on: false,
            writes: 0,
        };
        {
            let dyn_relay: &mut dyn RelayOutput<Error = ()> = &mut relay;
            dyn_relay.set_energized(true).unwrap();
        }
        assert!(relay.on);
        assert_eq!(relay.writes, 1);
    }

    struct FixedClock(Timestamp);

    impl Clock for FixedClock {
        fn now_ms(&self) -> Timestamp {
            self.0
        }
    }

    #[test]
    fn clock_reports_value() {
        assert_eq!(FixedClock(42).now_ms(), 42);
    }
}
