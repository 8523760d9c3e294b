//! Console and configuration-portal transports.
//!
//! The configuration console only exists while the ConsoleGate is open.
//! Both transports are started and stopped by [`crate::gate::ConsoleGate`]
//! on gate edges and polled by the main loop in between.

extern crate alloc;
use alloc::string::String;

use crate::settings::Settings;

/// Line-oriented console transport (telnet-style remote serial channel).
///
/// Only one client is served at a time.
pub trait ConsoleTransport {
    /// Error type for console operations.
    type Error: core::fmt::Debug;

    /// Begin listening for a client.
    fn start(&mut self, device_name: &str) -> Result<(), Self::Error>;

    /// Drop any client and stop listening.
    fn stop(&mut self);

    /// Accept pending clients and pump buffered I/O. Called once per tick.
    fn poll(&mut self) {}

    /// Whether a client is currently attached.
    fn has_client(&self) -> bool;

    /// Next complete input line, without the terminator (non-blocking).
    fn read_line(&mut self) -> Option<String>;

    /// Send one line to the attached client. Dropped if nobody is attached.
    fn write_line(&mut self, line: &str);
}

/// Optional access-point + web form used to edit [`Settings`].
///
/// Submissions are handed to the main loop through [`take_submission`];
/// the portal never mutates device state itself.
///
/// [`take_submission`]: ConfigPortal::take_submission
pub trait ConfigPortal {
    /// Error type for portal operations.
    type Error: core::fmt::Debug;

    /// Bring the portal up, pre-filled with the current settings.
    fn start(&mut self, settings: &Settings) -> Result<(), Self::Error>;

    /// Tear the portal down.
    fn stop(&mut self);

    /// Settings submitted through the form since the last call.
    fn take_submission(&mut self) -> Option<Settings>;

    /// Whether a station is associated with the portal.
    fn has_client(&self) -> bool {
        false
    }
}

/// Portal for builds without the AP/web extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoPortal;

impl ConfigPortal for NoPortal {
    type Error = core::convert::Infallible;

    fn start(&mut self, _settings: &Settings) -> Result<(), Self::Error> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn take_submission(&mut self) -> Option<Settings> {
        None
    }
}
