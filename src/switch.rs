//! The power switch main loop.
//!
//! [`PowerSwitch`] owns the link supervisors, the live settings and one
//! handle per platform collaborator, and borrows the [`SharedFlags`] it
//! shares with the button interrupt. The firmware calls [`PowerSwitch::tick`]
//! as often as it likes; every step is idempotent when nothing changed.
//!
//! # Example
//!
//! ```rust
//! use relay_switch::{PowerSwitch, SharedFlags, Parts};
//! use relay_switch::hal::MockPlatform;
//!
//! let flags = SharedFlags::new();
//! let mut switch = PowerSwitch::<MockPlatform>::new(&flags, Parts::default());
//! switch.begin();
//!
//! flags.set_power(true);
//! let report = switch.tick(10);
//! assert!(report.power_changed);
//! assert!(switch.relay().energized);
//! ```

extern crate alloc;
use alloc::format;

use crate::clock::{has_elapsed, Timestamp, NEVER};
use crate::console::{self, CommandEffect, LinkReport, LinkView};
use crate::flags::SharedFlags;
use crate::gate::{ClientEdge, ConsoleGate, GateTransition};
use crate::publisher;
use crate::settings::Settings;
use crate::supervisor::{BusSupervisor, WifiSupervisor};
use crate::traits::{
    ConfigPortal, ConsoleTransport, MqttClient, Platform, RelayOutput, StatusLed, WifiDriver,
};

// ============================================================================
// Status LED
// ============================================================================

/// Connectivity tier shown by the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlinkTier {
    /// WiFi down: fast blink.
    #[default]
    NoWifi,
    /// WiFi up, broker unreachable.
    WifiOnly,
    /// Broker session up: slow blink.
    Online,
}

impl BlinkTier {
    /// Tier for the current link state.
    pub const fn from_links(wifi_up: bool, bus_up: bool) -> Self {
        match (wifi_up, bus_up) {
            (true, true) => BlinkTier::Online,
            (true, false) => BlinkTier::WifiOnly,
            (false, _) => BlinkTier::NoWifi,
        }
    }

    /// Time between LED toggles.
    pub const fn period_ms(&self) -> u32 {
        match self {
            BlinkTier::NoWifi => 250,
            BlinkTier::WifiOnly => 1_000,
            BlinkTier::Online => 3_000,
        }
    }
}

// ============================================================================
// Platform parts
// ============================================================================

/// One handle per platform collaborator, moved into [`PowerSwitch::new`].
pub struct Parts<P: Platform> {
    /// Relay output.
    pub relay: P::Relay,
    /// Status LED.
    pub led: P::Led,
    /// WiFi station.
    pub wifi: P::Wifi,
    /// MQTT client.
    pub mqtt: P::Mqtt,
    /// Console line transport.
    pub console: P::Console,
    /// Configuration portal.
    pub portal: P::Portal,
    /// Settings storage.
    pub store: P::Store,
}

impl<P> Default for Parts<P>
where
    P: Platform,
    P::Relay: Default,
    P::Led: Default,
    P::Wifi: Default,
    P::Mqtt: Default,
    P::Console: Default,
    P::Portal: Default,
    P::Store: Default,
{
    fn default() -> Self {
        Self {
            relay: Default::default(),
            led: Default::default(),
            wifi: Default::default(),
            mqtt: Default::default(),
            console: Default::default(),
            portal: Default::default(),
            store: Default::default(),
        }
    }
}

// ============================================================================
// Tick report
// ============================================================================

/// What one [`PowerSwitch::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Console gate edge handled this tick.
    pub gate: Option<GateTransition>,
    /// WiFi usable after this tick.
    pub wifi_up: bool,
    /// Broker session usable after this tick.
    pub bus_up: bool,
    /// LED tier in effect.
    pub tier: BlinkTier,
    /// Console lines executed.
    pub console_lines: usize,
    /// Bus messages that changed PowerState.
    pub remote_changes: usize,
    /// Relay was driven to a new PowerState.
    pub power_changed: bool,
}

// ============================================================================
// PowerSwitch
// ============================================================================

/// The switch: supervisors, settings and platform handles in one context.
pub struct PowerSwitch<'f, P: Platform> {
    flags: &'f SharedFlags,
    settings: Settings,
    relay: P::Relay,
    led: P::Led,
    wifi: P::Wifi,
    mqtt: P::Mqtt,
    console: P::Console,
    portal: P::Portal,
    store: P::Store,
    wifi_sup: WifiSupervisor,
    bus_sup: BusSupervisor,
    gate: ConsoleGate,
    applied_power: bool,
    led_lit: bool,
    last_blink: Timestamp,
}

impl<'f, P: Platform> PowerSwitch<'f, P> {
    /// Assemble a switch around `flags` with default settings.
    pub fn new(flags: &'f SharedFlags, parts: Parts<P>) -> Self {
        Self {
            flags,
            settings: Settings::default(),
            relay: parts.relay,
            led: parts.led,
            wifi: parts.wifi,
            mqtt: parts.mqtt,
            console: parts.console,
            portal: parts.portal,
            store: parts.store,
            wifi_sup: WifiSupervisor::new(),
            bus_sup: BusSupervisor::new(),
            gate: ConsoleGate::new(),
            applied_power: false,
            led_lit: false,
            last_blink: NEVER,
        }
    }

    /// Replace the link supervisors, e.g. with custom retry gates.
    pub fn with_supervisors(mut self, wifi: WifiSupervisor, bus: BusSupervisor) -> Self {
        self.wifi_sup = wifi;
        self.bus_sup = bus;
        self
    }

    /// Startup: drive the relay off and load stored settings.
    pub fn begin(&mut self) {
        self.flags.set_power(false);
        self.applied_power = false;
        if let Err(e) = self.relay.set_energized(false) {
            log::warn!("relay: initial write failed: {:?}", e);
        }
        self.settings = Settings::load(&mut self.store);
        log::info!(
            "switch: '{}' ready (wifi {}, broker {})",
            self.settings.device_name,
            if self.settings.has_wifi() { "configured" } else { "off" },
            if self.settings.has_broker() { "configured" } else { "off" },
        );
    }

    /// Run one reconciliation pass.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();

        let transition = self.gate.reconcile(
            self.flags.console(),
            now,
            &self.settings,
            &mut self.console,
            &mut self.portal,
        );
        if transition != GateTransition::Unchanged {
            report.gate = Some(transition);
        }

        if self.gate.is_active() {
            report.console_lines = self.service_console(now);
            if self.gate.idle_expired(now) {
                log::info!("console: idle timeout");
                self.flags.set_console(false);
                report.gate = Some(self.gate.reconcile(
                    false,
                    now,
                    &self.settings,
                    &mut self.console,
                    &mut self.portal,
                ));
            }
        }

        report.wifi_up = self.wifi_sup.ensure(&mut self.wifi, &self.settings, now);
        if !report.wifi_up {
            self.bus_sup.link_down();
        }
        report.bus_up = report.wifi_up
            && self
                .bus_sup
                .ensure(&mut self.mqtt, &self.settings, self.flags.power(), now);
        report.tier = BlinkTier::from_links(report.wifi_up, report.bus_up);
        self.blink(report.tier, now);

        if report.bus_up {
            report.remote_changes = self
                .bus_sup
                .service(&mut self.mqtt, &self.settings, self.flags);
        }

        report.power_changed = self.apply_power(report.bus_up);
        report
    }

    fn service_console(&mut self, now: Timestamp) -> usize {
        self.console.poll();

        let attached = self.console.has_client() || self.portal.has_client();
        if self.gate.track_client(attached, now) == ClientEdge::Attached
            && self.console.has_client()
        {
            self.console.write_line(&format!(
                "{} console, type 'help'",
                self.settings.device_name
            ));
        }

        let mut effect = CommandEffect::default();
        let mut lines = 0;
        while let Some(line) = self.console.read_line() {
            let links = self.link_report(now);
            let outcome = console::handle_line(&line, &mut self.settings, self.flags, &links);
            for reply in &outcome.reply {
                self.console.write_line(reply);
            }
            effect = effect.merge(outcome.effect);
            lines += 1;
        }

        if let Some(submitted) = self.portal.take_submission() {
            log::info!("portal: settings submitted");
            effect = effect.merge(submission_effect(&self.settings, &submitted));
            self.settings = submitted;
        }

        self.apply_effect(effect);
        lines
    }

    fn apply_effect(&mut self, effect: CommandEffect) {
        if effect.persist {
            match self.settings.save(&mut self.store) {
                Ok(()) => log::info!("settings: saved"),
                Err(e) => log::warn!("settings: save failed: {}", e),
            }
        }
        if effect.restart_wifi {
            self.wifi_sup
                .restart(&mut self.wifi, &mut self.bus_sup, &mut self.mqtt);
        } else if effect.restart_bus {
            self.bus_sup.restart(&mut self.mqtt);
        }
    }

    fn blink(&mut self, tier: BlinkTier, now: Timestamp) {
        if has_elapsed(now, self.last_blink, tier.period_ms()) {
            self.led_lit = !self.led_lit;
            self.led.set_lit(self.led_lit);
            self.last_blink = now;
        }
    }

    fn apply_power(&mut self, bus_up: bool) -> bool {
        let power = self.flags.power();
        if power == self.applied_power {
            return false;
        }
        self.applied_power = power;
        log::info!("power: {}", publisher::status_payload(power));
        if let Err(e) = self.relay.set_energized(power) {
            log::warn!("relay: write failed: {:?}", e);
        }
        if bus_up {
            if let Err(e) = publisher::publish_status(&mut self.mqtt, &self.settings, power) {
                log::warn!("mqtt: status publish failed: {:?}", e);
            }
        }
        true
    }

    /// Snapshot of both links for status reports.
    pub fn link_report(&self, now: Timestamp) -> LinkReport {
        LinkReport {
            wifi: LinkView {
                state: self.wifi_sup.state(),
                status: self.wifi.status(),
                since_attempt: self.wifi_sup.gate().since_last(now),
            },
            bus: LinkView {
                state: self.bus_sup.state(),
                status: self.mqtt.status(),
                since_attempt: self.bus_sup.gate().since_last(now),
            },
        }
    }

    /// Shared flags.
    pub fn flags(&self) -> &'f SharedFlags {
        self.flags
    }

    /// Live settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// PowerState last driven onto the relay by the loop.
    pub fn applied_power(&self) -> bool {
        self.applied_power
    }

    /// Console gate.
    pub fn gate(&self) -> &ConsoleGate {
        &self.gate
    }

    /// WiFi supervisor.
    pub fn wifi_supervisor(&self) -> &WifiSupervisor {
        &self.wifi_sup
    }

    /// Bus supervisor.
    pub fn bus_supervisor(&self) -> &BusSupervisor {
        &self.bus_sup
    }

    /// Relay handle.
    pub fn relay(&self) -> &P::Relay {
        &self.relay
    }

    /// Status LED handle.
    pub fn led(&self) -> &P::Led {
        &self.led
    }

    /// WiFi driver.
    pub fn wifi(&self) -> &P::Wifi {
        &self.wifi
    }

    /// Mutable WiFi driver.
    pub fn wifi_mut(&mut self) -> &mut P::Wifi {
        &mut self.wifi
    }

    /// MQTT client.
    pub fn mqtt(&self) -> &P::Mqtt {
        &self.mqtt
    }

    /// Mutable MQTT client.
    pub fn mqtt_mut(&mut self) -> &mut P::Mqtt {
        &mut self.mqtt
    }

    /// Console transport.
    pub fn console(&self) -> &P::Console {
        &self.console
    }

    /// Mutable console transport.
    pub fn console_mut(&mut self) -> &mut P::Console {
        &mut self.console
    }

    /// Mutable configuration portal.
    pub fn portal_mut(&mut self) -> &mut P::Portal {
        &mut self.portal
    }

    /// Settings storage.
    pub fn store(&self) -> &P::Store {
        &self.store
    }
}

/// Follow-up work for a settings record replacing `current`.
pub fn submission_effect(current: &Settings, submitted: &Settings) -> CommandEffect {
    if current == submitted {
        return CommandEffect::default();
    }
    let wifi_changed = current.wifi_ssid != submitted.wifi_ssid
        || current.wifi_password != submitted.wifi_password;
    CommandEffect {
        persist: true,
        restart_wifi: wifi_changed,
        restart_bus: !wifi_changed,
    }
}
