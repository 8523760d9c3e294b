//! Desktop transports for the switch.
//!
//! These implement the platform traits on top of std networking so the
//! full switch (console, portal, broker session, persisted settings) can
//! run on a development machine:
//! - `telnet`: single-client TCP line console
//! - `store`: fixed-size record file
//! - `mqtt` feature: `rumqttc` client with last will
//! - `web` feature: Axum configuration form portal
//!
//! None of them block the caller; network work happens on background
//! threads and is handed over through channels or mutex-guarded slots.

pub mod store;
pub mod telnet;

#[cfg(feature = "web")]
pub mod web;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use store::FileStore;
pub use telnet::TcpConsole;

#[cfg(feature = "web")]
pub use web::{build_router, WebPortal, WebPortalConfig};

#[cfg(feature = "mqtt")]
pub use mqtt::{BusError, RumqttcClient};
