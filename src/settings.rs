//! Durable device settings.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Record Format
//!
//! Settings persist as a fixed-size record of [`RECORD_LEN`] bytes:
//!
//! ```text
//! [0]      magic/version byte (SETTINGS_MAGIC)
//! [1..]    postcard-encoded Settings, zero padded
//! ```
//!
//! A record whose first byte is not [`SETTINGS_MAGIC`] means "nothing
//! stored yet": [`Settings::load`] falls back to defaults instead of failing.
//!
//! # Example
//!
//! ```rust
//! use relay_switch::settings::Settings;
//!
//! let settings = Settings::default()
//!     .with_wifi("HomeNet", "secret")
//!     .with_mqtt_server("192.168.1.10", 1883)
//!     .with_topics("lamp/set", "lamp/status");
//!
//! let record = settings.encode().unwrap();
//! assert_eq!(Settings::decode(&record).unwrap(), settings);
//! ```

use heapless::String as HString;
use serde::{Deserialize, Serialize};

use crate::traits::SettingsStore;

/// Maximum length for short settings strings (names, credentials, hosts)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer settings strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short settings strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer settings strings
pub type LongString = HString<MAX_LONG_STRING>;

/// Leading byte of a valid settings record. Bump when the layout changes.
pub const SETTINGS_MAGIC: u8 = 0xA7;

/// Size of the persisted record in bytes.
pub const RECORD_LEN: usize = 1024;

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default device name.
pub const DEFAULT_DEVICE_NAME: &str = "relay-switch";

// ============================================================================
// Helpers for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= N)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Errors
// ============================================================================

/// Failure to read or write the settings record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// The store holds no record.
    #[error("no stored settings")]
    Empty,
    /// First byte is not the expected magic.
    #[error("settings header {found:#04x} does not match {expected:#04x}")]
    BadHeader {
        /// Byte found in the record.
        found: u8,
        /// Byte this firmware writes.
        expected: u8,
    },
    /// Header matched but the body did not decode.
    #[error("settings record is corrupt")]
    Corrupt,
    /// Encoded settings exceed the record size.
    #[error("settings do not fit in the record")]
    TooLarge,
    /// The storage backend reported an error.
    #[error("settings storage failed")]
    Storage,
}

// ============================================================================
// Settings
// ============================================================================

/// Complete persisted device configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Human-readable device name; also the fallback MQTT client id.
    pub device_name: ShortString,
    /// WiFi network SSID (empty = WiFi disabled)
    pub wifi_ssid: ShortString,
    /// WiFi password (empty = open network)
    pub wifi_password: ShortString,
    /// Broker hostname or IP (empty = MQTT disabled)
    pub mqtt_server: ShortString,
    /// Broker port
    pub mqtt_port: u16,
    /// Explicit client id (empty = use device name)
    pub mqtt_id: ShortString,
    /// Username (empty = no auth)
    pub mqtt_user: ShortString,
    /// Password (empty = no password)
    pub mqtt_password: ShortString,
    /// Topic carrying on/off commands (empty = don't subscribe)
    pub control_topic: LongString,
    /// Topic mirroring the relay state (empty = don't publish)
    pub status_topic: LongString,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: short_string(DEFAULT_DEVICE_NAME),
            wifi_ssid: ShortString::new(),
            wifi_password: ShortString::new(),
            mqtt_server: ShortString::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_id: ShortString::new(),
            mqtt_user: ShortString::new(),
            mqtt_password: ShortString::new(),
            control_topic: LongString::new(),
            status_topic: LongString::new(),
        }
    }
}

impl Settings {
    /// Defaults overridden by build-time environment variables.
    ///
    /// Reads `DEVICE_NAME`, `WIFI_SSID`, `WIFI_PASSWORD` and `MQTT_HOST`
    /// when set at compile time.
    pub fn from_build_env() -> Self {
        let mut settings = Self::default();
        if let Some(name) = option_env!("DEVICE_NAME") {
            settings.device_name = short_string(name);
        }
        if let Some(ssid) = option_env!("WIFI_SSID") {
            settings.wifi_ssid = short_string(ssid);
        }
        if let Some(password) = option_env!("WIFI_PASSWORD") {
            settings.wifi_password = short_string(password);
        }
        if let Some(host) = option_env!("MQTT_HOST") {
            settings.mqtt_server = short_string(host);
        }
        settings
    }

    /// Set the device name
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = short_string(name);
        self
    }

    /// Set WiFi credentials
    pub fn with_wifi(mut self, ssid: &str, password: &str) -> Self {
        self.wifi_ssid = short_string(ssid);
        self.wifi_password = short_string(password);
        self
    }

    /// Set the broker address
    pub fn with_mqtt_server(mut self, host: &str, port: u16) -> Self {
        self.mqtt_server = short_string(host);
        self.mqtt_port = port;
        self
    }

    /// Set the explicit client id
    pub fn with_mqtt_id(mut self, id: &str) -> Self {
        self.mqtt_id = short_string(id);
        self
    }

    /// Set broker credentials
    pub fn with_mqtt_auth(mut self, user: &str, password: &str) -> Self {
        self.mqtt_user = short_string(user);
        self.mqtt_password = short_string(password);
        self
    }

    /// Set the control and status topics
    pub fn with_topics(mut self, control: &str, status: &str) -> Self {
        self.control_topic = long_string(control);
        self.status_topic = long_string(status);
        self
    }

    /// Check if WiFi credentials are configured
    pub fn has_wifi(&self) -> bool {
        !self.wifi_ssid.is_empty()
    }

    /// Check if a broker is configured
    pub fn has_broker(&self) -> bool {
        !self.mqtt_server.is_empty()
    }

    /// Client id sent to the broker: explicit id, else the device name.
    pub fn client_id(&self) -> &str {
        if self.mqtt_id.is_empty() {
            self.device_name.as_str()
        } else {
            self.mqtt_id.as_str()
        }
    }

    /// Username, if authentication is configured.
    pub fn mqtt_username(&self) -> Option<&str> {
        non_empty(&self.mqtt_user)
    }

    /// Password, if one is configured.
    pub fn mqtt_password(&self) -> Option<&str> {
        non_empty(&self.mqtt_password)
    }

    /// Control topic, if configured.
    pub fn control_topic(&self) -> Option<&str> {
        non_empty(&self.control_topic)
    }

    /// Status topic, if configured.
    pub fn status_topic(&self) -> Option<&str> {
        non_empty(&self.status_topic)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Encode into a fixed-size record.
    pub fn encode(&self) -> Result<[u8; RECORD_LEN], SettingsError> {
        let mut record = [0u8; RECORD_LEN];
        record[0] = SETTINGS_MAGIC;
        postcard::to_slice(self, &mut record[1..]).map_err(|_| SettingsError::TooLarge)?;
        Ok(record)
    }

    /// Decode a record produced by [`encode`](Self::encode).
    pub fn decode(record: &[u8]) -> Result<Self, SettingsError> {
        match record.first() {
            None => Err(SettingsError::Empty),
            Some(&found) if found != SETTINGS_MAGIC => Err(SettingsError::BadHeader {
                found,
                expected: SETTINGS_MAGIC,
            }),
            Some(_) => postcard::from_bytes(&record[1..]).map_err(|_| SettingsError::Corrupt),
        }
    }

    /// Load from `store`, using `defaults` when nothing valid is stored.
    pub fn load_or<S: SettingsStore>(store: &mut S, defaults: Self) -> Self {
        let mut record = [0u8; RECORD_LEN];
        let decoded = match store.load(&mut record) {
            Ok(len) => Self::decode(&record[..len]),
            Err(e) => {
                log::warn!("settings: storage read failed: {:?}", e);
                Err(SettingsError::Storage)
            }
        };
        match decoded {
            Ok(settings) => settings,
            Err(SettingsError::Empty) => {
                log::info!("settings: nothing stored, using defaults");
                defaults
            }
            Err(e) => {
                log::warn!("settings: {}, using defaults", e);
                defaults
            }
        }
    }

    /// Load from `store`, using compiled-in defaults when nothing valid is stored.
    pub fn load<S: SettingsStore>(store: &mut S) -> Self {
        Self::load_or(store, Self::from_build_env())
    }

    /// Persist to `store`.
    pub fn save<S: SettingsStore>(&self, store: &mut S) -> Result<(), SettingsError> {
        let record = self.encode()?;
        store.save(&record).map_err(|e| {
            log::warn!("settings: storage write failed: {:?}", e);
            SettingsError::Storage
        })
    }
}

fn non_empty<const N: usize>(s: &HString<N>) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
