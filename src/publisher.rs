//! Status topic publishing.
//!
//! The status topic mirrors PowerState as a retained `ON`/`OFF`. The broker
//! holds `OFFLINE` there as our last will, so a fresh publish is required
//! every time the session comes back, not only when the relay changes.

use crate::settings::Settings;
use crate::traits::{LastWill, MqttClient, Qos};

/// Retained payload while energized.
pub const PAYLOAD_ON: &str = "ON";

/// Retained payload while de-energized.
pub const PAYLOAD_OFF: &str = "OFF";

/// Last-will payload the broker publishes when we drop off.
pub const PAYLOAD_OFFLINE: &str = "OFFLINE";

/// Status payload for a PowerState value.
#[inline]
pub const fn status_payload(power: bool) -> &'static str {
    if power {
        PAYLOAD_ON
    } else {
        PAYLOAD_OFF
    }
}

/// Last will for the configured status topic, if any.
pub fn last_will(settings: &Settings) -> Option<LastWill<'_>> {
    settings.status_topic().map(|topic| LastWill {
        topic,
        payload: PAYLOAD_OFFLINE.as_bytes(),
        qos: Qos::AtLeastOnce,
        retain: true,
    })
}

/// Publish the current PowerState, retained.
///
/// Returns `Ok(false)` without touching the client when no status topic is
/// configured.
pub fn publish_status<C: MqttClient>(
    client: &mut C,
    settings: &Settings,
    power: bool,
) -> Result<bool, C::Error> {
    let Some(topic) = settings.status_topic() else {
        return Ok(false);
    };
    client.publish(topic, status_payload(power).as_bytes(), true)?;
    log::debug!("status: published {} to {}", status_payload(power), topic);
    Ok(true)
}
