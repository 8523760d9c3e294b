//! WiFi station supervisor.

use crate::clock::Timestamp;
use crate::settings::Settings;
use crate::traits::{LinkStatus, MqttClient, WifiDriver};

use super::{BusSupervisor, LinkState, RetryGate};

/// Keeps the station associated with the configured network.
#[derive(Clone, Debug, Default)]
pub struct WifiSupervisor {
    state: LinkState,
    observed: LinkStatus,
    gate: RetryGate,
}

impl WifiSupervisor {
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

    /// Driver status seen on the last `ensure` call.
    pub fn observed_status(&self) -> LinkStatus {
        self.observed
    }

    /// Retry bookkeeping.
    pub fn gate(&self) -> &RetryGate {
        &self.gate
    }

    /// Keep the link alive. Returns true when the station is connected.
    ///
    /// A newly started attempt still returns false; completion is picked up
    /// by a later call.
    pub fn ensure<W: WifiDriver>(
        &mut self,
        driver: &mut W,
        settings: &Settings,
        now: Timestamp,
    ) -> bool {
        let status = driver.status();
        if status != self.observed {
            log::info!(
                "wifi: status {} -> {}",
                self.observed.as_str(),
                status.as_str()
            );
            self.observed = status;
        }

        if status == LinkStatus::Connected {
            self.state = LinkState::Up;
            return true;
        }

        if !settings.has_wifi() {
            self.state = LinkState::Down;
            return false;
        }

        if self.gate.is_open(now) {
            log::info!("wifi: connecting to '{}'", settings.wifi_ssid);
            if let Err(e) = driver.begin(&settings.wifi_ssid, &settings.wifi_password) {
                log::warn!("wifi: begin failed: {:?}", e);
            }
            self.gate.mark(now);
            self.state = LinkState::Connecting;
        } else if self.state == LinkState::Up {
            self.state = LinkState::Down;
        }

        false
    }

    /// Drop the association and retry on the next `ensure`.
    ///
    /// The bus session rides on the station, so it is restarted too.
    pub fn restart<W: WifiDriver, C: MqttClient>(
        &mut self,
        driver: &mut W,
        bus: &mut BusSupervisor,
        client: &mut C,
    ) {
        log::info!("wifi: restart requested");
        driver.disconnect();
        self.gate.reset();
        self.state = LinkState::Down;
        bus.restart(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockMqtt, MockWifi};
    use crate::supervisor::RETRY_INTERVAL_MS;

    fn configured() -> Settings {
        Settings::default().with_wifi("HomeNet", "secret")
    }

    #[test]
    fn no_ssid_never_attempts() {
        let mut sup = WifiSupervisor::new();
        let mut wifi = MockWifi::new();
        let settings = Settings::default();

        for now in [0, 1, 60_000, 200_000] {
            assert!(!sup.ensure(&mut wifi, &settings, now));
        }
        assert_eq!(wifi.begin_calls, 0);
        assert_eq!(sup.gate().last_attempt(), 0);
        assert_eq!(sup.state(), LinkState::Down);
    }

    #[test]
    fn first_call_attempts_immediately() {
        let mut sup = WifiSupervisor::new();
        let mut wifi = MockWifi::new();

        assert!(!sup.ensure(&mut wifi, &configured(), 10));
        assert_eq!(wifi.begin_calls, 1);
        assert_eq!(wifi.last_ssid.as_deref(), Some("HomeNet"));
        assert_eq!(sup.state(), LinkState::Connecting);
        assert_eq!(sup.gate().last_attempt(), 10);
    }

    #[test]
    fn retry_is_rate_limited() {
        let mut sup = WifiSupervisor::new();
        let mut wifi = MockWifi::new();
        let settings = configured();

        sup.ensure(&mut wifi, &settings, 1_000);
        sup.ensure(&mut wifi, &settings, 1_000 + RETRY_INTERVAL_MS - 1);
        assert_eq!(wifi.begin_calls, 1);

        sup.ensure(&mut wifi, &settings, 1_000 + RETRY_INTERVAL_MS);
        assert_eq!(wifi.begin_calls, 2);
    }

    #[test]
    fn retry_survives_counter_wrap() {
        let mut sup = WifiSupervisor::new();
        let mut wifi = MockWifi::new();
        let settings = configured();

        let start = u32::MAX - 30_000;
        sup.ensure(&mut wifi, &settings, start);
        sup.ensure(&mut wifi, &settings, 20_000);
        assert_eq!(wifi.begin_calls, 1);
        sup.ensure(&mut wifi, &settings, 30_000);
        assert_eq!(wifi.begin_calls, 2);
    }

    #[test]
    fn connected_returns_true_without_attempt() {
        let mut sup = WifiSupervisor::new();
        let mut wifi = MockWifi::new();
        wifi.status = LinkStatus::Connected;

        assert!(sup.ensure(&mut wifi, &configured(), 5));
        assert_eq!(wifi.begin_calls, 0);
        assert_eq!(sup.state(), LinkState::Up);
        assert_eq!(sup.observed_status(), LinkStatus::Connected);
    }

    #[test]
    fn completion_observed_on_later_call() {
        let mut sup = WifiSupervisor::new();
        let mut wifi = MockWifi::new();
        let settings = configured();

        assert!(!sup.ensure(&mut wifi, &settings, 0));
        wifi.status = LinkStatus::Connected;
        assert!(sup.ensure(&mut wifi, &settings, 20));
    }

    #[test]
    fn begin_error_still_consumes_attempt() {
        let mut sup = WifiSupervisor::new();
        let mut wifi = MockWifi::new();
        wifi.fail_begin = true;
        let settings = configured();

        assert!(!sup.ensure(&mut wifi, &settings, 100));
        assert!(!sup.ensure(&mut wifi, &settings, 200));
        assert_eq!(wifi.begin_calls, 1);
    }

    #[test]
    fn restart_retries_immediately_and_restarts_bus() {
        let mut sup = WifiSupervisor::new();
        let mut bus = BusSupervisor::new();
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();
        let settings = configured();

        sup.ensure(&mut wifi, &settings, 1_000);
        sup.restart(&mut wifi, &mut bus, &mut mqtt);
        assert_eq!(wifi.disconnect_calls, 1);
        assert_eq!(mqtt.disconnect_calls, 1);
        assert_eq!(sup.state(), LinkState::Down);

        sup.ensure(&mut wifi, &settings, 1_001);
        assert_eq!(wifi.begin_calls, 2);
    }
}
