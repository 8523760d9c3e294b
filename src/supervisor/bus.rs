//! MQTT session supervisor.
//!
//! Besides keeping the session up, the supervisor owns the two things that
//! must happen on every fresh session: subscribing to the control topic and
//! republishing the retained status (the broker replaced it with the
//! `OFFLINE` last will while we were gone).

use crate::clock::Timestamp;
use crate::decoder;
use crate::flags::SharedFlags;
use crate::publisher;
use crate::settings::Settings;
use crate::traits::{ConnectOptions, LinkStatus, MqttClient};

use super::{LinkState, RetryGate};

/// Socket timeout for broker connections.
pub const SOCKET_TIMEOUT_MS: u32 = 5_000;

/// Keep-alive sent to the broker.
pub const KEEP_ALIVE_SECS: u16 = 15;

/// Keeps the broker session alive once WiFi is up.
#[derive(Clone, Debug, Default)]
pub struct BusSupervisor {
    state: LinkState,
    observed: LinkStatus,
    was_connected: bool,
    gate: RetryGate,
}

/// Connection parameters derived from settings.
pub fn connect_options(settings: &Settings) -> ConnectOptions<'_> {
    ConnectOptions {
        host: settings.mqtt_server.as_str(),
        port: settings.mqtt_port,
        client_id: settings.client_id(),
        username: settings.mqtt_username(),
        password: settings.mqtt_password(),
        last_will: publisher::last_will(settings),
        keep_alive_secs: KEEP_ALIVE_SECS,
        socket_timeout_ms: SOCKET_TIMEOUT_MS,
    }
}

impl BusSupervisor {
    /// Supervisor that has never attempted a connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supervisor with a custom retry gate.
    pub fn with_gate(gate: RetryGate) -> Self {
        Self {
            gate,
            ..Self::default()
        }
    }

    /// Current supervisor state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Client status seen on the last `ensure` call.
    pub fn observed_status(&self) -> LinkStatus {
        self.observed
    }

    /// Retry bookkeeping.
    pub fn gate(&self) -> &RetryGate {
        &self.gate
    }

    /// Keep the session alive. Returns true when connected.
    ///
    /// On the call that first sees the session up, the retained status is
    /// published with the current PowerState.
    pub fn ensure<C: MqttClient>(
        &mut self,
        client: &mut C,
        settings: &Settings,
        power: bool,
        now: Timestamp,
    ) -> bool {
        let status = client.status();
        if status != self.observed {
            log::info!(
                "mqtt: status {} -> {}",
                self.observed.as_str(),
                status.as_str()
            );
            self.observed = status;
        }

        if client.is_connected() {
            if !self.was_connected {
                self.was_connected = true;
                if let Err(e) = publisher::publish_status(client, settings, power) {
                    log::warn!("mqtt: status publish after connect failed: {:?}", e);
                }
            }
            self.state = LinkState::Up;
            return true;
        }
        self.was_connected = false;

        if !settings.has_broker() {
            self.state = LinkState::Down;
            return false;
        }

        if self.gate.is_open(now) {
            self.gate.mark(now);
            self.state = LinkState::Connecting;
            self.attempt(client, settings);
        } else if self.state == LinkState::Up {
            self.state = LinkState::Down;
        }

        false
    }

    fn attempt<C: MqttClient>(&mut self, client: &mut C, settings: &Settings) {
        let options = connect_options(settings);
        log::info!(
            "mqtt: connecting to {}:{} as '{}'",
            options.host,
            options.port,
            options.client_id
        );

        if let Err(e) = client.connect(&options) {
            log::warn!("mqtt: connect failed: {:?}", e);
            return;
        }

        if let Some(topic) = settings.control_topic() {
            match client.subscribe(topic) {
                Ok(()) => log::info!("mqtt: subscribed to {}", topic),
                Err(e) => log::warn!("mqtt: subscribe to {} failed: {:?}", topic, e),
            }
        }
    }

    /// Drain inbound messages into the decoder.
    ///
    /// Returns how many messages changed PowerState.
    pub fn service<C: MqttClient>(
        &mut self,
        client: &mut C,
        settings: &Settings,
        flags: &SharedFlags,
    ) -> usize {
        let mut changed = 0;
        while let Some(msg) = client.try_recv() {
            let Some(command) = decoder::decode(&msg.topic, &msg.payload, &settings.control_topic)
            else {
                continue;
            };
            log::info!("mqtt: remote command {:?}", command);
            if decoder::apply(command, flags) {
                changed += 1;
            }
        }
        changed
    }

    /// Forget the session edge while the network underneath is down.
    ///
    /// Whatever the client reports once WiFi returns, the next `ensure`
    /// that sees it connected treats the session as fresh and republishes.
    pub fn link_down(&mut self) {
        self.was_connected = false;
        if self.state == LinkState::Up {
            self.state = LinkState::Down;
        }
    }

    /// Close the session and retry on the next `ensure`.
    pub fn restart<C: MqttClient>(&mut self, client: &mut C) {
        log::info!("mqtt: restart requested");
        client.disconnect();
        self.gate.reset();
        self.was_connected = false;
        self.state = LinkState::Down;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockMqtt;
    use crate::supervisor::RETRY_INTERVAL_MS;
    use crate::traits::{MqttMessage, Qos};

    fn configured() -> Settings {
        Settings::default()
            .with_device_name("porch")
            .with_mqtt_server("broker.local", 1883)
            .with_topics("porch/set", "porch/status")
    }

    #[test]
    fn options_derive_from_settings() {
        let settings = configured().with_mqtt_auth("user", "");
        let options = connect_options(&settings);
        assert_eq!(options.host, "broker.local");
        assert_eq!(options.port, 1883);
        assert_eq!(options.client_id, "porch");
        assert_eq!(options.username, Some("user"));
        assert_eq!(options.password, None);
        assert_eq!(options.socket_timeout_ms, 5_000);

        let will = options.last_will.unwrap();
        assert_eq!(will.topic, "porch/status");
        assert_eq!(will.payload, b"OFFLINE");
        assert_eq!(will.qos, Qos::AtLeastOnce);
        assert!(will.retain);
    }

    #[test]
    fn explicit_id_wins() {
        let settings = configured().with_mqtt_id("porch-7");
        assert_eq!(connect_options(&settings).client_id, "porch-7");
    }

    #[test]
    fn link_down_rearms_status_publish() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();
        let settings = configured();

        sup.ensure(&mut mqtt, &settings, false, 100);
        assert!(sup.ensure(&mut mqtt, &settings, false, 110));
        assert_eq!(mqtt.published_to("porch/status").len(), 1);

        // Client still reports the session after the outage
        sup.link_down();
        assert_eq!(sup.state(), LinkState::Down);
        assert!(sup.ensure(&mut mqtt, &settings, true, 120));
        let published = mqtt.published_to("porch/status");
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].1, b"ON");
        assert_eq!(mqtt.connect_calls, 1);
    }

    #[test]
    fn no_server_never_attempts() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();
        let settings = Settings::default();

        for now in [0, 60_000, 120_001] {
            assert!(!sup.ensure(&mut mqtt, &settings, false, now));
        }
        assert_eq!(mqtt.connect_calls, 0);
        assert_eq!(sup.gate().last_attempt(), 0);
    }

    #[test]
    fn successful_attempt_subscribes_control_topic() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();

        assert!(!sup.ensure(&mut mqtt, &configured(), false, 100));
        assert_eq!(mqtt.connect_calls, 1);
        assert!(mqtt.is_subscribed("porch/set"));
        assert_eq!(mqtt.last_options.as_ref().unwrap().client_id, "porch");
    }

    #[test]
    fn failed_attempt_does_not_subscribe() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();
        mqtt.fail_connect = true;

        assert!(!sup.ensure(&mut mqtt, &configured(), false, 100));
        assert_eq!(mqtt.connect_calls, 1);
        assert!(mqtt.subscriptions.is_empty());
        assert_eq!(sup.state(), LinkState::Connecting);
    }

    #[test]
    fn no_control_topic_no_subscribe() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();
        let settings = configured().with_topics("", "porch/status");

        sup.ensure(&mut mqtt, &settings, false, 100);
        assert!(mqtt.subscriptions.is_empty());
    }

    #[test]
    fn retry_is_rate_limited() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();
        mqtt.fail_connect = true;
        let settings = configured();

        sup.ensure(&mut mqtt, &settings, false, 5_000);
        sup.ensure(&mut mqtt, &settings, false, 5_000 + RETRY_INTERVAL_MS - 1);
        assert_eq!(mqtt.connect_calls, 1);
        sup.ensure(&mut mqtt, &settings, false, 5_000 + RETRY_INTERVAL_MS);
        assert_eq!(mqtt.connect_calls, 2);
    }

    #[test]
    fn reconnect_publishes_status_once() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();
        let settings = configured();

        sup.ensure(&mut mqtt, &settings, true, 0);
        mqtt.connected = true;

        assert!(sup.ensure(&mut mqtt, &settings, true, 10));
        assert!(sup.ensure(&mut mqtt, &settings, true, 20));
        assert!(sup.ensure(&mut mqtt, &settings, true, 30));
        assert_eq!(
            mqtt.published_to("porch/status"),
            vec![&("porch/status".to_string(), b"ON".to_vec(), true)]
        );

        // Broker drops us; the next session republishes
        mqtt.connected = false;
        assert!(!sup.ensure(&mut mqtt, &settings, true, 40));
        mqtt.connected = true;
        assert!(sup.ensure(&mut mqtt, &settings, true, 50));
        assert_eq!(mqtt.published_to("porch/status").len(), 2);
    }

    #[test]
    fn service_dispatches_control_messages() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::new();
        let flags = SharedFlags::new();
        let settings = configured();

        mqtt.queue_message("porch/set", "ON");
        mqtt.queue_message("porch/set", "maybe");
        mqtt.queue_message("elsewhere", "off");
        assert_eq!(sup.service(&mut mqtt, &settings, &flags), 1);
        assert!(flags.power());
        assert!(mqtt.try_recv().is_none());

        mqtt.incoming.push(MqttMessage::new("porch/set", "0"));
        assert_eq!(sup.service(&mut mqtt, &settings, &flags), 1);
        assert!(!flags.power());
    }

    #[test]
    fn restart_resets_gate() {
        let mut sup = BusSupervisor::new();
        let mut mqtt = MockMqtt::disconnected();
        mqtt.fail_connect = true;
        let settings = configured();

        sup.ensure(&mut mqtt, &settings, false, 1_000);
        sup.restart(&mut mqtt);
        assert_eq!(mqtt.disconnect_calls, 1);
        sup.ensure(&mut mqtt, &settings, false, 1_001);
        assert_eq!(mqtt.connect_calls, 2);
    }
}
