//! Flags shared between interrupt and main-loop context.
//!
//! The appliance has exactly two pieces of state that the button ISR may
//! write: whether the relay should be energized, and whether the
//! configuration console is open. Each is an independent [`AtomicBool`];
//! there is no invariant spanning both, so no lock is ever taken.
//!
//! # Example
//!
//! ```rust
//! use relay_switch::flags::SharedFlags;
//!
//! static FLAGS: SharedFlags = SharedFlags::new();
//!
//! assert!(!FLAGS.power());
//! assert!(FLAGS.toggle_power());
//! assert!(FLAGS.power());
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

/// PowerState and ConsoleGate bits.
#[derive(Debug, Default)]
pub struct SharedFlags {
    power: AtomicBool,
    console: AtomicBool,
}

impl SharedFlags {
    /// Both flags start cleared: relay off, console closed.
    pub const fn new() -> Self {
        Self {
            power: AtomicBool::new(false),
            console: AtomicBool::new(false),
        }
    }

    /// Current PowerState.
    #[inline]
    pub fn power(&self) -> bool {
        self.power.load(Ordering::Acquire)
    }

    /// Store a PowerState value.
    #[inline]
    pub fn set_power(&self, on: bool) {
        self.power.store(on, Ordering::Release);
    }

    /// Flip PowerState, returning the new value.
    #[inline]
    pub fn toggle_power(&self) -> bool {
        !self.power.fetch_xor(true, Ordering::AcqRel)
    }

    /// Current ConsoleGate value.
    #[inline]
    pub fn console(&self) -> bool {
        self.console.load(Ordering::Acquire)
    }

    /// Store a ConsoleGate value.
    #[inline]
    pub fn set_console(&self, active: bool) {
        self.console.store(active, Ordering::Release);
    }

    /// Flip ConsoleGate, returning the new value.
    #[inline]
    pub fn toggle_console(&self) -> bool {
        !self.console.fetch_xor(true, Ordering::AcqRel)
    }
}
