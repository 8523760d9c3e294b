//! # relay-switch
//!
//! A network-connected power relay with a physical push button, MQTT
//! control and an on-demand configuration console.
//!
//! ## Features
//!
//! - **Interrupt-safe button**: short press toggles power, a five second
//!   hold opens the configuration console
//! - **MQTT control**: `on|true|1` / `off|false|0` on the control topic,
//!   retained `ON`/`OFF` on the status topic, `OFFLINE` last will
//! - **Self-healing links**: WiFi and broker retried on a fixed interval,
//!   surviving millisecond counter wrap
//! - **Configuration console**: line commands over any transport, plus an
//!   optional web form portal
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware, network and console abstractions
//! - `input` - Button latch run from the interrupt handler
//! - `supervisor` - WiFi and broker link supervisors
//! - `decoder` / `publisher` - Control and status topics
//! - `console` / `gate` - Console command grammar and lifecycle
//! - `portal` - Configuration form shared by desktop and ESP32 portals
//! - `switch` - Main loop that ties everything together
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use relay_switch::{PowerSwitch, Parts, SharedFlags, InputLatch, ButtonEvent};
//! use relay_switch::hal::{MockPlatform, MockRelay};
//!
//! static FLAGS: SharedFlags = SharedFlags::new();
//! static LATCH: InputLatch = InputLatch::new();
//!
//! let mut switch = PowerSwitch::<MockPlatform>::new(&FLAGS, Parts::default());
//! switch.begin();
//!
//! // Button ISR: press at t=1000, release at t=1200
//! let mut isr_relay = MockRelay::new();
//! LATCH.on_edge(true, 1_000, &FLAGS, &mut isr_relay);
//! let event = LATCH.on_edge(false, 1_200, &FLAGS, &mut isr_relay);
//! assert_eq!(event, ButtonEvent::ShortPress);
//!
//! // Main loop picks up the new PowerState
//! let report = switch.tick(1_210);
//! assert!(report.power_changed);
//! assert!(switch.relay().energized);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Wrap-safe millisecond timestamps.
pub mod clock;
/// Configuration console command grammar.
pub mod console;
/// Control topic payload decoding.
pub mod decoder;
/// Atomic flags shared with the button interrupt.
pub mod flags;
/// Console gate lifecycle and idle timeout.
pub mod gate;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Button latch driven from the interrupt handler.
pub mod input;
/// Configuration form shared by the web portals.
pub mod portal;
/// Retained status publishing.
pub mod publisher;
/// Persisted device settings.
pub mod settings;
/// WiFi and MQTT link supervisors.
pub mod supervisor;
/// Main loop context.
pub mod switch;
/// Core traits for hardware, network and console abstraction.
pub mod traits;

/// Desktop transports: TCP console, rumqttc client, axum portal, file store.
#[cfg(feature = "std")]
pub mod services;

// Re-exports for convenience
pub use clock::{elapsed, has_elapsed, Timestamp, DEBOUNCE_MS, LONG_HOLD_MS, NEVER};
pub use console::{Command, CommandEffect, CommandOutcome, ConsoleError, LinkReport, LinkView};
pub use decoder::RemoteCommand;
pub use flags::SharedFlags;
pub use gate::{ClientEdge, ConsoleGate, GateTransition, IDLE_TIMEOUT_MS};
pub use input::{ButtonEvent, InputLatch};
pub use portal::{FormError, PortalForm};
#[cfg(feature = "std")]
pub use portal::PortalState;
pub use settings::{Settings, SettingsError};
pub use supervisor::{BusSupervisor, LinkState, RetryGate, WifiSupervisor, RETRY_INTERVAL_MS};
pub use switch::{BlinkTier, Parts, PowerSwitch, TickReport};
pub use traits::{
    // Hardware
    Clock,
    // Console
    ConfigPortal,
    ConnectOptions,
    ConsoleTransport,
    LastWill,
    // Network
    LinkStatus,
    MqttClient,
    MqttMessage,
    NoPortal,
    Platform,
    Qos,
    RelayOutput,
    SettingsStore,
    StatusLed,
    WifiDriver,
};
