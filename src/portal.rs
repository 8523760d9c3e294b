//! Configuration form shared by the desktop and ESP32 portals.
//!
//! Both portals serve the same HTML form and accept the same
//! `application/x-www-form-urlencoded` body. Field names match the
//! [`Settings`] fields. Blank password fields keep the stored password;
//! `-` clears it, as on the console.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::console::CLEAR_TOKEN;
use crate::settings::{long_string, short_string, Settings};

/// Rejected form submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// Port is not a number in 1..=65535.
    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

/// Submitted form fields, all as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalForm {
    /// Device name.
    pub device_name: String,
    /// WiFi SSID.
    pub wifi_ssid: String,
    /// WiFi password; blank keeps the stored one.
    pub wifi_password: String,
    /// Broker host.
    pub mqtt_server: String,
    /// Broker port as typed.
    pub mqtt_port: String,
    /// Explicit client id.
    pub mqtt_id: String,
    /// Broker username.
    pub mqtt_user: String,
    /// Broker password; blank keeps the stored one.
    pub mqtt_password: String,
    /// Control topic.
    pub control_topic: String,
    /// Status topic.
    pub status_topic: String,
}

impl PortalForm {
    /// Decode an urlencoded body. Unknown keys are ignored.
    pub fn from_urlencoded(body: &str) -> Self {
        let mut form = Self::default();
        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = percent_decode(value);
            match percent_decode(key).as_str() {
                "device_name" => form.device_name = value,
                "wifi_ssid" => form.wifi_ssid = value,
                "wifi_password" => form.wifi_password = value,
                "mqtt_server" => form.mqtt_server = value,
                "mqtt_port" => form.mqtt_port = value,
                "mqtt_id" => form.mqtt_id = value,
                "mqtt_user" => form.mqtt_user = value,
                "mqtt_password" => form.mqtt_password = value,
                "control_topic" => form.control_topic = value,
                "status_topic" => form.status_topic = value,
                _ => {}
            }
        }
        form
    }

    /// Settings after applying this form on top of `base`.
    pub fn apply(&self, base: &Settings) -> Result<Settings, FormError> {
        let port = self.mqtt_port.trim();
        let mqtt_port = if port.is_empty() {
            base.mqtt_port
        } else {
            match port.parse::<u16>() {
                Ok(p) if p > 0 => p,
                _ => return Err(FormError::InvalidPort(port.into())),
            }
        };

        let mut settings = base.clone();
        settings.device_name = short_string(self.device_name.trim());
        settings.wifi_ssid = short_string(self.wifi_ssid.trim());
        settings.mqtt_server = short_string(self.mqtt_server.trim());
        settings.mqtt_port = mqtt_port;
        settings.mqtt_id = short_string(self.mqtt_id.trim());
        settings.mqtt_user = short_string(self.mqtt_user.trim());
        settings.control_topic = long_string(self.control_topic.trim());
        settings.status_topic = long_string(self.status_topic.trim());
        if let Some(pw) = secret(&self.wifi_password) {
            settings.wifi_password = short_string(pw);
        }
        if let Some(pw) = secret(&self.mqtt_password) {
            settings.mqtt_password = short_string(pw);
        }
        Ok(settings)
    }
}

fn secret(field: &str) -> Option<&str> {
    match field {
        "" => None,
        CLEAR_TOKEN => Some(""),
        pw => Some(pw),
    }
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode `+` and `%XX` escapes. Malformed escapes pass through.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push(h << 4 | l);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Escape text for an HTML attribute or body.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn field(label: &str, name: &str, value: &str, kind: &str) -> String {
    format!(
        "<label>{label}<input type=\"{kind}\" name=\"{name}\" value=\"{}\"></label>\n",
        escape_html(value)
    )
}

/// Render the settings form. Passwords are never echoed.
pub fn render_form(settings: &Settings) -> String {
    let mut body = String::new();
    body.push_str(&field("Device name", "device_name", &settings.device_name, "text"));
    body.push_str(&field("WiFi SSID", "wifi_ssid", &settings.wifi_ssid, "text"));
    body.push_str(&field("WiFi password", "wifi_password", "", "password"));
    body.push_str(&field("MQTT server", "mqtt_server", &settings.mqtt_server, "text"));
    body.push_str(&field(
        "MQTT port",
        "mqtt_port",
        &format!("{}", settings.mqtt_port),
        "number",
    ));
    body.push_str(&field("MQTT client id", "mqtt_id", &settings.mqtt_id, "text"));
    body.push_str(&field("MQTT user", "mqtt_user", &settings.mqtt_user, "text"));
    body.push_str(&field("MQTT password", "mqtt_password", "", "password"));
    body.push_str(&field(
        "Control topic",
        "control_topic",
        &settings.control_topic,
        "text",
    ));
    body.push_str(&field(
        "Status topic",
        "status_topic",
        &settings.status_topic,
        "text",
    ));

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{name}</title></head>\n\
         <body><h1>{name}</h1>\n<form method=\"post\" action=\"/save\">\n{body}\
         <p>Leave a password blank to keep it, enter - to clear it.</p>\n\
         <button type=\"submit\">Save</button>\n</form></body></html>\n",
        name = escape_html(&settings.device_name),
    )
}

/// Page returned after a successful save.
pub const SAVED_PAGE: &str = "<!DOCTYPE html>\n<html><body><p>Saved. The device \
     reconnects with the new settings.</p><p><a href=\"/\">Back</a></p></body></html>\n";

// ============================================================================
// Shared State
// ============================================================================

#[cfg(feature = "std")]
fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Settings shown by the form and the submission waiting for the main loop.
///
/// Shared between the HTTP handlers and the portal handle.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct PortalState {
    current: std::sync::Mutex<Settings>,
    pending: std::sync::Mutex<Option<Settings>>,
}

#[cfg(feature = "std")]
impl PortalState {
    /// State pre-filled with `settings`.
    pub fn new(settings: Settings) -> Self {
        Self {
            current: std::sync::Mutex::new(settings),
            pending: std::sync::Mutex::new(None),
        }
    }

    /// Settings the form currently shows.
    pub fn current(&self) -> Settings {
        lock(&self.current).clone()
    }

    /// Take the latest accepted submission.
    pub fn take_pending(&self) -> Option<Settings> {
        lock(&self.pending).take()
    }

    /// Validate a decoded form and queue the result.
    ///
    /// A later submission replaces an uncollected earlier one.
    pub fn submit(&self, form: &PortalForm) -> Result<Settings, FormError> {
        let mut current = lock(&self.current);
        let updated = form.apply(&current)?;
        *current = updated.clone();
        *lock(&self.pending) = Some(updated.clone());
        Ok(updated)
    }
}
