//! Console Gate lifecycle.
//!
//! The button ISR only flips the ConsoleGate bit. Starting the console
//! transport and the configuration portal happens here, in the main loop,
//! when the bit is seen to have changed.
//! Comparing against the previously observed value makes each side effect
//! fire exactly once per edge no matter how often the loop runs.
//!
//! While active, the gate closes itself after [`IDLE_TIMEOUT_MS`] without an
//! attached client. The idle clock starts at activation and restarts on
//! every client disconnect.

use crate::clock::{has_elapsed, Timestamp};
use crate::settings::Settings;
use crate::traits::{ConfigPortal, ConsoleTransport};

/// Idle time after which an unattended console closes.
pub const IDLE_TIMEOUT_MS: u32 = 600_000;

/// Result of reconciling the gate flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    /// Flag unchanged since the last call.
    Unchanged,
    /// Console (and portal) started.
    Activated,
    /// Console (and portal) stopped.
    Deactivated,
}

/// Client attach/detach edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEdge {
    /// No change.
    None,
    /// A client connected.
    Attached,
    /// The client went away.
    Detached,
}

/// Main-loop side of the ConsoleGate.
#[derive(Debug, Clone, Default)]
pub struct ConsoleGate {
    active: bool,
    client_attached: bool,
    last_disconnect: Timestamp,
}

impl ConsoleGate {
    /// Gate in the Inactive state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the console is currently running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a client was attached at the last check.
    pub fn client_attached(&self) -> bool {
        self.client_attached
    }

    /// Start of the current idle period.
    pub fn last_disconnect(&self) -> Timestamp {
        self.last_disconnect
    }

    /// Start or stop the transports when `flag` differs from the last
    /// observed value.
    pub fn reconcile<C, P>(
        &mut self,
        flag: bool,
        now: Timestamp,
        settings: &Settings,
        console: &mut C,
        portal: &mut P,
    ) -> GateTransition
    where
        C: ConsoleTransport,
        P: ConfigPortal,
    {
        if flag == self.active {
            return GateTransition::Unchanged;
        }
        self.active = flag;

        if flag {
            log::info!("console: opening");
            if let Err(e) = console.start(&settings.device_name) {
                log::warn!("console: transport start failed: {:?}", e);
            }
            if let Err(e) = portal.start(settings) {
                log::warn!("console: portal start failed: {:?}", e);
            }
            self.client_attached = false;
            self.last_disconnect = now;
            GateTransition::Activated
        } else {
            log::info!("console: closing");
            console.stop();
            portal.stop();
            self.client_attached = false;
            GateTransition::Deactivated
        }
    }

    /// Record the current attach state, returning the edge if it changed.
    pub fn track_client(&mut self, attached: bool, now: Timestamp) -> ClientEdge {
        if attached == self.client_attached {
            return ClientEdge::None;
        }
        self.client_attached = attached;
        if attached {
            log::info!("console: client attached");
            ClientEdge::Attached
        } else {
            log::info!("console: client detached");
            self.last_disconnect = now;
            ClientEdge::Detached
        }
    }

    /// Whether the unattended console has timed out.
    pub fn idle_expired(&self, now: Timestamp) -> bool {
        self.active
            && !self.client_attached
            && has_elapsed(now, self.last_disconnect, IDLE_TIMEOUT_MS)
    }
}
