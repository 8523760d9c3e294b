//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for every platform trait, so the
//! whole switch can run on a desktop with no ESP32 attached.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockRelay`] | [`RelayOutput`] | Tracks relay writes |
//! | [`MockLed`] | [`StatusLed`] | Counts blinks |
//! | [`MockClock`] | [`Clock`] | Controllable wrapping time source |
//! | [`MockWifi`] | [`WifiDriver`] | Scriptable station status |
//! | [`MockMqtt`] | [`MqttClient`] | Captures connect/pub/sub operations |
//! | [`MockConsole`] | [`ConsoleTransport`] | Queued input lines, captured output |
//! | [`MockPortal`] | [`ConfigPortal`] | Queued settings submissions |
//! | [`MockStore`] | [`SettingsStore`] | In-memory settings record |
//!
//! [`MockPlatform`] bundles them for [`PowerSwitch`](crate::PowerSwitch).
//!
//! # Example
//!
//! ```rust
//! use relay_switch::{PowerSwitch, Parts, SharedFlags};
//! use relay_switch::hal::MockPlatform;
//!
//! let flags = SharedFlags::new();
//! let mut switch = PowerSwitch::<MockPlatform>::new(&flags, Parts::default());
//! switch.begin();
//!
//! // Simulate a remote "on" while offline: the relay follows on the next tick
//! flags.set_power(true);
//! switch.tick(100);
//! assert!(switch.relay().energized);
//! ```
//!
//! [`RelayOutput`]: crate::traits::RelayOutput
//! [`StatusLed`]: crate::traits::StatusLed
//! [`Clock`]: crate::traits::Clock
//! [`WifiDriver`]: crate::traits::WifiDriver
//! [`MqttClient`]: crate::traits::MqttClient
//! [`ConsoleTransport`]: crate::traits::ConsoleTransport
//! [`ConfigPortal`]: crate::traits::ConfigPortal
//! [`SettingsStore`]: crate::traits::SettingsStore

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::clock::Timestamp;
use crate::settings::Settings;
use crate::traits::{
    Clock, ConfigPortal, ConnectOptions, ConsoleTransport, LinkStatus, MqttClient, MqttMessage,
    Platform, RelayOutput, SettingsStore, StatusLed, WifiDriver,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock relay output.
///
/// # Example
///
/// ```rust
/// use relay_switch::hal::MockRelay;
/// use relay_switch::traits::RelayOutput;
///
/// let mut relay = MockRelay::new();
/// relay.set_energized(true).unwrap();
/// assert!(relay.energized);
/// assert_eq!(relay.writes, 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockRelay {
    /// Current line state.
    pub energized: bool,
    /// Number of `set_energized` calls.
    pub writes: usize,
    /// Fail every write.
    pub fail: bool,
}

impl MockRelay {
    /// Creates a de-energized relay.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelayOutput for MockRelay {
    type Error = ();

    fn set_energized(&mut self, on: bool) -> Result<(), ()> {
        self.writes += 1;
        if self.fail {
            return Err(());
        }
        self.energized = on;
        Ok(())
    }
}

/// Mock status LED.
#[derive(Debug, Default, Clone)]
pub struct MockLed {
    /// Current LED state.
    pub lit: bool,
    /// Number of on/off changes.
    pub toggles: usize,
}

impl MockLed {
    /// Creates a dark LED.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusLed for MockLed {
    fn set_lit(&mut self, lit: bool) {
        if lit != self.lit {
            self.toggles += 1;
        }
        self.lit = lit;
    }
}

/// Mock clock for testing time-dependent behavior.
///
/// Wraps at `u32::MAX` like the device counter.
///
/// # Example
///
/// ```rust
/// use relay_switch::hal::MockClock;
/// use relay_switch::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockClock {
    current_ms: Timestamp,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: Timestamp) {
        self.current_ms = ms;
    }

    /// Advances the clock, wrapping on overflow.
    pub fn advance(&mut self, ms: u32) {
        self.current_ms = self.current_ms.wrapping_add(ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> Timestamp {
        self.current_ms
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock WiFi station.
///
/// `begin` moves the status to `Connecting`; tests decide when (and
/// whether) it becomes `Connected`.
#[derive(Debug, Default, Clone)]
pub struct MockWifi {
    /// Status reported to the supervisor.
    pub status: LinkStatus,
    /// Number of `begin` calls.
    pub begin_calls: usize,
    /// Number of `disconnect` calls.
    pub disconnect_calls: usize,
    /// SSID from the last `begin`.
    pub last_ssid: Option<String>,
    /// Fail every `begin`.
    pub fail_begin: bool,
    /// Report `Connected` right after `begin`.
    pub connect_on_begin: bool,
}

impl MockWifi {
    /// Creates an idle station.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a station that associates as soon as it is asked to.
    pub fn instant() -> Self {
        Self {
            connect_on_begin: true,
            ..Self::default()
        }
    }
}

impl WifiDriver for MockWifi {
    type Error = ();

    fn begin(&mut self, ssid: &str, _password: &str) -> Result<(), ()> {
        self.begin_calls += 1;
        if self.fail_begin {
            self.status = LinkStatus::Failed;
            return Err(());
        }
        self.last_ssid = Some(ssid.to_string());
        self.status = if self.connect_on_begin {
            LinkStatus::Connected
        } else {
            LinkStatus::Connecting
        };
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.status = LinkStatus::Idle;
    }

    fn status(&self) -> LinkStatus {
        self.status
    }
}

/// Owned copy of the last [`ConnectOptions`] seen by [`MockMqtt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOptions {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client id.
    pub client_id: String,
    /// Username, if any.
    pub username: Option<String>,
    /// Password, if any.
    pub password: Option<String>,
    /// Last-will topic, if any.
    pub will_topic: Option<String>,
    /// Keep-alive in seconds.
    pub keep_alive_secs: u16,
}

impl From<&ConnectOptions<'_>> for RecordedOptions {
    fn from(options: &ConnectOptions<'_>) -> Self {
        Self {
            host: options.host.to_string(),
            port: options.port,
            client_id: options.client_id.to_string(),
            username: options.username.map(ToString::to_string),
            password: options.password.map(ToString::to_string),
            will_topic: options.last_will.map(|w| w.topic.to_string()),
            keep_alive_secs: options.keep_alive_secs,
        }
    }
}

/// Mock MQTT client for testing.
///
/// Records all connect/publish/subscribe operations and allows injecting
/// incoming messages for testing message handling. A successful
/// `connect` marks the client connected immediately.
///
/// # Example
///
/// ```rust
/// use relay_switch::hal::MockMqtt;
/// use relay_switch::traits::MqttClient;
///
/// let mut mqtt = MockMqtt::new();
///
/// // Queue incoming message
/// mqtt.queue_message("porch/set", b"on".to_vec());
/// assert_eq!(mqtt.try_recv().unwrap().payload, b"on");
///
/// mqtt.publish("porch/status", b"ON", true).unwrap();
/// assert_eq!(mqtt.published_to("porch/status").len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages to be returned by `try_recv()`.
    pub incoming: Vec<MqttMessage>,
    /// Whether the client is connected.
    pub connected: bool,
    /// Number of `connect` calls.
    pub connect_calls: usize,
    /// Number of `disconnect` calls.
    pub disconnect_calls: usize,
    /// Options from the last `connect`.
    pub last_options: Option<RecordedOptions>,
    /// Fail every `connect`.
    pub fail_connect: bool,
    /// Fail every `publish`.
    pub fail_publish: bool,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in connected state.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Creates a client that has no session yet.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Queue an incoming message
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Get published messages for a topic
    pub fn published_to(&self, topic: &str) -> Vec<&(String, Vec<u8>, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = ();

    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), ()> {
        self.connect_calls += 1;
        self.last_options = Some(RecordedOptions::from(options));
        if self.fail_connect {
            return Err(());
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), ()> {
        if self.fail_publish {
            return Err(());
        }
        self.published.push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        if self.incoming.is_empty() {
            None
        } else {
            Some(self.incoming.remove(0))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// Console Mocks
// ============================================================================

/// Mock console transport.
///
/// Lines queued with [`send_line`](Self::send_line) are only delivered
/// while the transport runs and a client is attached.
#[derive(Debug, Default, Clone)]
pub struct MockConsole {
    /// Whether `start` has been called without a matching `stop`.
    pub running: bool,
    /// Whether a client is attached.
    pub client: bool,
    /// Lines waiting to be read.
    pub input: VecDeque<String>,
    /// Lines written by the switch.
    pub output: Vec<String>,
    /// Number of `start` calls.
    pub start_calls: usize,
    /// Number of `stop` calls.
    pub stop_calls: usize,
    /// Fail every `start`.
    pub fail_start: bool,
}

impl MockConsole {
    /// Creates a stopped console with no client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line as if typed by the client.
    pub fn send_line(&mut self, line: &str) {
        self.input.push_back(line.to_string());
    }

    /// Whether any written line contains `needle`.
    pub fn output_contains(&self, needle: &str) -> bool {
        self.output.iter().any(|l| l.contains(needle))
    }
}

impl ConsoleTransport for MockConsole {
    type Error = ();

    fn start(&mut self, _device_name: &str) -> Result<(), ()> {
        self.start_calls += 1;
        if self.fail_start {
            return Err(());
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_calls += 1;
        self.running = false;
        self.client = false;
    }

    fn has_client(&self) -> bool {
        self.running && self.client
    }

    fn read_line(&mut self) -> Option<String> {
        if !self.has_client() {
            return None;
        }
        self.input.pop_front()
    }

    fn write_line(&mut self, line: &str) {
        if self.has_client() {
            self.output.push(line.to_string());
        }
    }
}

/// Mock configuration portal.
#[derive(Debug, Default, Clone)]
pub struct MockPortal {
    /// Whether the portal is serving.
    pub running: bool,
    /// Whether a station is associated.
    pub client: bool,
    /// Settings waiting to be taken.
    pub submissions: VecDeque<Settings>,
    /// Number of `start` calls.
    pub start_calls: usize,
    /// Number of `stop` calls.
    pub stop_calls: usize,
}

impl MockPortal {
    /// Creates a stopped portal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a form submission.
    pub fn submit(&mut self, settings: Settings) {
        self.submissions.push_back(settings);
    }
}

impl ConfigPortal for MockPortal {
    type Error = ();

    fn start(&mut self, _settings: &Settings) -> Result<(), ()> {
        self.start_calls += 1;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_calls += 1;
        self.running = false;
        self.client = false;
    }

    fn take_submission(&mut self) -> Option<Settings> {
        if !self.running {
            return None;
        }
        self.submissions.pop_front()
    }

    fn has_client(&self) -> bool {
        self.running && self.client
    }
}

// ============================================================================
// Storage Mock
// ============================================================================

/// In-memory settings store.
#[derive(Debug, Default, Clone)]
pub struct MockStore {
    /// Stored record bytes.
    pub data: Vec<u8>,
    /// Number of successful `save` calls.
    pub saves: usize,
    /// Fail every `load`.
    pub fail_reads: bool,
    /// Fail every `save`.
    pub fail_writes: bool,
}

impl MockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with raw bytes.
    pub fn with_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            ..Self::default()
        }
    }

    /// Creates a store holding an encoded settings record.
    pub fn with_settings(settings: &Settings) -> Self {
        let mut store = Self::new();
        // Encoding default-sized settings always fits.
        let _ = settings.save(&mut store);
        store.saves = 0;
        store
    }
}

impl SettingsStore for MockStore {
    type Error = ();

    fn load(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        if self.fail_reads {
            return Err(());
        }
        let len = self.data.len().min(buf.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        Ok(len)
    }

    fn save(&mut self, record: &[u8]) -> Result<(), ()> {
        if self.fail_writes {
            return Err(());
        }
        self.data = record.to_vec();
        self.saves += 1;
        Ok(())
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Mock platform bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockPlatform;

impl Platform for MockPlatform {
    type Relay = MockRelay;
    type Led = MockLed;
    type Wifi = MockWifi;
    type Mqtt = MockMqtt;
    type Console = MockConsole;
    type Portal = MockPortal;
    type Store = MockStore;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_relay_failure_keeps_state() {
        let mut relay = MockRelay::new();
        relay.fail = true;
        assert!(relay.set_energized(true).is_err());
        assert!(!relay.energized);
        assert_eq!(relay.writes, 1);
    }

    #[test]
    fn mock_led_counts_changes() {
        let mut led = MockLed::new();
        led.set_lit(false);
        assert_eq!(led.toggles, 0);
        led.set_lit(true);
        led.set_lit(true);
        led.set_lit(false);
        assert_eq!(led.toggles, 2);
    }

    #[test]
    fn mock_clock_wraps() {
        let mut clock = MockClock::new();
        clock.set(u32::MAX - 1);
        clock.advance(3);
        assert_eq!(clock.now_ms(), 1);
    }

    #[test]
    fn mock_wifi_begin() {
        let mut wifi = MockWifi::new();
        wifi.begin("net", "pw").unwrap();
        assert_eq!(wifi.status(), LinkStatus::Connecting);
        assert!(!wifi.is_connected());

        let mut instant = MockWifi::instant();
        instant.begin("net", "").unwrap();
        assert!(instant.is_connected());
        instant.disconnect();
        assert_eq!(instant.status(), LinkStatus::Idle);
    }

    #[test]
    fn mock_mqtt_connect_records_options() {
        let mut mqtt = MockMqtt::disconnected();
        let options = ConnectOptions {
            host: "broker",
            port: 1883,
            client_id: "porch",
            username: None,
            password: None,
            last_will: None,
            keep_alive_secs: 15,
            socket_timeout_ms: 5_000,
        };
        mqtt.connect(&options).unwrap();
        assert!(mqtt.is_connected());
        let recorded = mqtt.last_options.clone().unwrap();
        assert_eq!(recorded.host, "broker");
        assert_eq!(recorded.will_topic, None);

        mqtt.disconnect();
        assert_eq!(mqtt.status(), LinkStatus::Idle);
    }

    #[test]
    fn mock_mqtt_fifo_order() {
        let mut mqtt = MockMqtt::new();
        mqtt.queue_message("a", "1");
        mqtt.queue_message("b", "2");
        assert_eq!(mqtt.try_recv().unwrap().topic, "a");
        assert_eq!(mqtt.try_recv().unwrap().topic, "b");
        assert!(mqtt.try_recv().is_none());
    }

    #[test]
    fn mock_console_needs_client() {
        let mut console = MockConsole::new();
        console.send_line("status");
        assert!(console.read_line().is_none());

        console.start("dev").unwrap();
        assert!(console.read_line().is_none());

        console.client = true;
        assert_eq!(console.read_line().as_deref(), Some("status"));
        console.write_line("ok");
        assert!(console.output_contains("ok"));

        console.stop();
        assert!(!console.has_client());
    }

    #[test]
    fn mock_store_round_trip() {
        let settings = Settings::default().with_device_name("garage");
        let mut store = MockStore::with_settings(&settings);
        assert_eq!(store.saves, 0);
        assert_eq!(Settings::load_or(&mut store, Settings::default()), settings);
    }
}
