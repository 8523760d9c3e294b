//! Trait definitions for hardware, networking and console abstraction.
//!
//! This module defines the core abstractions that allow relay-switch to:
//! - Run on different hardware (ESP32, desktop mock)
//! - Use different WiFi/MQTT stacks
//! - Serve its configuration console over any line transport
//!
//! # Submodules
//!
//! - `hardware`: Relay, status LED, clock, settings storage
//! - `network`: WiFi driver and MQTT client traits
//! - `console`: Console line transport and configuration portal
//!
//! # Platform Bundle
//!
//! [`Platform`] groups one implementation of each trait so the
//! [`PowerSwitch`](crate::PowerSwitch) stays a single type parameter.

pub mod console;
pub mod hardware;
pub mod network;

pub use console::*;
pub use hardware::*;
pub use network::*;

/// One concrete implementation per collaborator.
///
/// # Example
///
/// ```rust
/// use relay_switch::hal::MockPlatform;
/// use relay_switch::traits::Platform;
///
/// fn relay_of<P: Platform>(_: &P) {}
/// relay_of(&MockPlatform);
/// ```
pub trait Platform {
    /// Relay output line.
    type Relay: RelayOutput;
    /// Status LED.
    type Led: StatusLed;
    /// WiFi station driver.
    type Wifi: WifiDriver;
    /// MQTT client.
    type Mqtt: MqttClient;
    /// Configuration console transport.
    type Console: ConsoleTransport;
    /// Optional AP/web configuration portal.
    type Portal: ConfigPortal;
    /// Settings storage.
    type Store: SettingsStore;
}
