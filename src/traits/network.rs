//! Network abstraction traits for the WiFi station and the MQTT client.
//!
//! Both traits are **non-blocking by contract**: starting a connection
//! returns immediately and completion is observed later through
//! `status()` / `is_connected()`. The supervisors in [`crate::supervisor`]
//! rely on this to keep the main loop responsive while a link is down.
//!
//! # Topics
//!
//! ```text
//! <control topic>  - subscribed, "on|true|1" / "off|false|0"
//! <status topic>   - published retained "ON" / "OFF", LWT "OFFLINE"
//! ```

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// Link Status
// ============================================================================

/// Driver-reported link status, used for state-change diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// Driver idle, no attempt made.
    #[default]
    Idle,
    /// Negotiation in progress.
    Connecting,
    /// Link established.
    Connected,
    /// Last attempt failed.
    Failed,
    /// Link was up and dropped.
    Lost,
}

impl LinkStatus {
    /// Lowercase name for logs and console output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Idle => "idle",
            LinkStatus::Connecting => "connecting",
            LinkStatus::Connected => "connected",
            LinkStatus::Failed => "failed",
            LinkStatus::Lost => "lost",
        }
    }
}

// ============================================================================
// WiFi Driver Trait
// ============================================================================

/// WiFi station driver.
///
/// `begin` must only kick off association; the transport negotiates in the
/// background.
pub trait WifiDriver {
    /// Error type for WiFi operations.
    type Error: core::fmt::Debug;

    /// Start associating with `ssid`. Empty `password` means an open network.
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Drop the current association.
    fn disconnect(&mut self);

    /// Current driver status.
    fn status(&self) -> LinkStatus;

    /// Check if the station has an address.
    fn is_connected(&self) -> bool {
        self.status() == LinkStatus::Connected
    }
}

// ============================================================================
// MQTT Client Trait
// ============================================================================

/// MQTT quality-of-service levels used by the switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Qos {
    /// Fire and forget.
    AtMostOnce,
    /// Acknowledged delivery.
    AtLeastOnce,
}

/// Message the broker publishes on our behalf after an unexpected disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastWill<'a> {
    /// Topic for the will message.
    pub topic: &'a str,
    /// Will payload.
    pub payload: &'a [u8],
    /// Delivery QoS.
    pub qos: Qos,
    /// Whether the broker retains the will.
    pub retain: bool,
}

/// Parameters for a single broker connection attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectOptions<'a> {
    /// Broker hostname or IP.
    pub host: &'a str,
    /// Broker port.
    pub port: u16,
    /// Client identifier.
    pub client_id: &'a str,
    /// Username, if authentication is configured.
    pub username: Option<&'a str>,
    /// Password, if one is configured.
    pub password: Option<&'a str>,
    /// Last-will message.
    pub last_will: Option<LastWill<'a>>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Socket timeout in milliseconds.
    pub socket_timeout_ms: u32,
}

/// MQTT client trait for pub/sub messaging.
///
/// This trait uses a **sync-first design** that works on both ESP32 and
/// desktop. `connect` may block for at most the socket timeout in
/// [`ConnectOptions`]; `try_recv` never blocks.
///
/// # Example
///
/// ```rust,ignore
/// use relay_switch::traits::MqttClient;
///
/// fn announce<M: MqttClient>(client: &mut M) {
///     client.publish("switch/status", b"ON", true).unwrap();
/// }
/// ```
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Open a session with the broker.
    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), Self::Error>;

    /// Close the session. The broker does not fire the last will.
    fn disconnect(&mut self);

    /// Publish a message to a topic.
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next message (non-blocking).
    ///
    /// Returns `None` if no message is available.
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;

    /// Driver status for diagnostics.
    fn status(&self) -> LinkStatus {
        if self.is_connected() {
            LinkStatus::Connected
        } else {
            LinkStatus::Idle
        }
    }
}

/// An MQTT message received from a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}
