//! Integration tests for the switch main loop on the mock platform

use relay_switch::hal::{MockConsole, MockLed, MockMqtt, MockPlatform, MockPortal, MockRelay, MockStore, MockWifi};
use relay_switch::{
    BlinkTier, ButtonEvent, GateTransition, InputLatch, LinkStatus, Parts, PowerSwitch,
    Settings, SharedFlags, Timestamp, LONG_HOLD_MS,
};

const CONTROL: &str = "porch/set";
const STATUS: &str = "porch/status";

fn configured() -> Settings {
    Settings::default()
        .with_device_name("porch")
        .with_wifi("HomeNet", "secret")
        .with_mqtt_server("broker.local", 1883)
        .with_topics(CONTROL, STATUS)
}

fn switch_with<'a>(flags: &'a SharedFlags, settings: &Settings) -> PowerSwitch<'a, MockPlatform> {
    let parts = Parts::<MockPlatform> {
        relay: MockRelay::new(),
        led: MockLed::new(),
        wifi: MockWifi::instant(),
        mqtt: MockMqtt::disconnected(),
        console: MockConsole::new(),
        portal: MockPortal::new(),
        store: MockStore::with_settings(settings),
    };
    let mut switch = PowerSwitch::new(flags, parts);
    switch.begin();
    switch
}

/// Tick until WiFi and the broker session are both up. Returns the next free time.
fn bring_up(switch: &mut PowerSwitch<'_, MockPlatform>, start: Timestamp) -> Timestamp {
    // associate, connect, then observe the session
    switch.tick(start);
    switch.tick(start + 10);
    let report = switch.tick(start + 20);
    assert!(report.wifi_up && report.bus_up);
    assert_eq!(report.tier, BlinkTier::Online);
    start + 30
}

fn press(latch: &InputLatch, flags: &SharedFlags, at: Timestamp, hold: u32) -> ButtonEvent {
    let mut isr_relay = MockRelay::new();
    latch.on_edge(true, at, flags, &mut isr_relay);
    latch.on_edge(false, at.wrapping_add(hold), flags, &mut isr_relay)
}

fn payloads(switch: &PowerSwitch<'_, MockPlatform>, topic: &str) -> Vec<(String, bool)> {
    switch
        .mqtt()
        .published_to(topic)
        .into_iter()
        .map(|(_, payload, retain)| (String::from_utf8_lossy(payload).into_owned(), *retain))
        .collect()
}

// ============================================================================
// Startup and Links
// ============================================================================

#[test]
fn boots_off_and_loads_stored_settings() {
    let flags = SharedFlags::new();
    flags.set_power(true);
    let switch = switch_with(&flags, &configured());

    assert!(!flags.power());
    assert!(!switch.relay().energized);
    assert_eq!(switch.settings().device_name.as_str(), "porch");
    assert_eq!(switch.settings().mqtt_server.as_str(), "broker.local");
}

#[test]
fn first_session_publishes_retained_state() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    bring_up(&mut switch, 1_000);

    assert_eq!(switch.wifi().last_ssid.as_deref(), Some("HomeNet"));
    assert!(switch.mqtt().is_subscribed(CONTROL));
    assert_eq!(payloads(&switch, STATUS), vec![("OFF".to_string(), true)]);

    let options = switch.mqtt().last_options.clone().expect("connected once");
    assert_eq!(options.host, "broker.local");
    assert_eq!(options.port, 1883);
    assert_eq!(options.will_topic.as_deref(), Some(STATUS));
}

#[test]
fn unconfigured_switch_stays_offline() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &Settings::default().with_device_name("bare"));

    for now in (1_000..2_000).step_by(10) {
        let report = switch.tick(now);
        assert!(!report.wifi_up);
        assert!(!report.bus_up);
        assert_eq!(report.tier, BlinkTier::NoWifi);
    }
    assert_eq!(switch.wifi().begin_calls, 0);
    assert_eq!(switch.mqtt().connect_calls, 0);
}

#[test]
fn wifi_without_broker_blinks_slow() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(
        &flags,
        &Settings::default().with_device_name("porch").with_wifi("HomeNet", ""),
    );

    switch.tick(1_000);
    let report = switch.tick(1_010);
    assert!(report.wifi_up);
    assert!(!report.bus_up);
    assert_eq!(report.tier, BlinkTier::WifiOnly);
    assert_eq!(switch.mqtt().connect_calls, 0);
}

// ============================================================================
// Power
// ============================================================================

#[test]
fn short_press_drives_relay_and_publishes() {
    let flags = SharedFlags::new();
    let latch = InputLatch::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    assert_eq!(press(&latch, &flags, now, 200), ButtonEvent::ShortPress);
    assert!(flags.power());

    let report = switch.tick(now + 210);
    assert!(report.power_changed);
    assert!(switch.relay().energized);
    assert!(switch.applied_power());
    assert_eq!(
        payloads(&switch, STATUS),
        vec![("OFF".to_string(), true), ("ON".to_string(), true)]
    );

    // Nothing more to do on the next pass
    assert!(!switch.tick(now + 220).power_changed);
    assert_eq!(switch.mqtt().published.len(), 2);
}

#[test]
fn press_while_offline_switches_relay_only() {
    let flags = SharedFlags::new();
    let latch = InputLatch::new();
    let mut switch = switch_with(&flags, &Settings::default().with_device_name("porch"));

    press(&latch, &flags, 1_000, 150);
    let report = switch.tick(1_200);
    assert!(report.power_changed);
    assert!(switch.relay().energized);
    assert!(switch.mqtt().published.is_empty());
}

#[test]
fn remote_command_drives_relay() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    switch.mqtt_mut().queue_message(CONTROL, "on");
    let report = switch.tick(now);
    assert_eq!(report.remote_changes, 1);
    assert!(report.power_changed);
    assert!(switch.relay().energized);
    assert_eq!(payloads(&switch, STATUS).last(), Some(&("ON".to_string(), true)));

    // Repeating the current state changes nothing
    switch.mqtt_mut().queue_message(CONTROL, "TRUE");
    let report = switch.tick(now + 10);
    assert_eq!(report.remote_changes, 0);
    assert!(!report.power_changed);

    switch.mqtt_mut().queue_message(CONTROL, "0");
    let report = switch.tick(now + 20);
    assert_eq!(report.remote_changes, 1);
    assert!(!switch.relay().energized);
    assert_eq!(payloads(&switch, STATUS).last(), Some(&("OFF".to_string(), true)));
}

#[test]
fn foreign_topics_and_junk_are_ignored() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    switch.mqtt_mut().queue_message("other/set", "on");
    switch.mqtt_mut().queue_message(CONTROL, "toggle");
    switch.mqtt_mut().queue_message(STATUS, "ON");
    let report = switch.tick(now);

    assert_eq!(report.remote_changes, 0);
    assert!(!flags.power());
    assert!(!switch.relay().energized);
}

#[test]
fn reconnect_republishes_state_once() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    switch.mqtt_mut().queue_message(CONTROL, "on");
    switch.tick(now);
    assert_eq!(payloads(&switch, STATUS).len(), 2);

    // Broker drops the session; the retry gate was marked at 1_010
    switch.mqtt_mut().connected = false;
    let report = switch.tick(now + 10);
    assert!(report.wifi_up);
    assert!(!report.bus_up);
    assert_eq!(report.tier, BlinkTier::WifiOnly);
    assert_eq!(switch.mqtt().connect_calls, 1);

    switch.tick(61_009);
    assert_eq!(switch.mqtt().connect_calls, 1);
    switch.tick(61_010);
    assert_eq!(switch.mqtt().connect_calls, 2);

    let report = switch.tick(61_020);
    assert!(report.bus_up);
    assert_eq!(
        payloads(&switch, STATUS),
        vec![
            ("OFF".to_string(), true),
            ("ON".to_string(), true),
            ("ON".to_string(), true),
        ]
    );

    switch.tick(61_030);
    assert_eq!(payloads(&switch, STATUS).len(), 3);
}

#[test]
fn power_change_during_wifi_outage_is_published_on_return() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    switch.wifi_mut().status = LinkStatus::Lost;
    flags.set_power(true);
    let report = switch.tick(now);
    assert!(!report.wifi_up);
    assert!(!report.bus_up);
    assert!(report.power_changed);
    assert!(switch.relay().energized);
    assert_eq!(payloads(&switch, STATUS), vec![("OFF".to_string(), true)]);

    // The broker session outlived the outage
    switch.wifi_mut().status = LinkStatus::Connected;
    let report = switch.tick(now + 10);
    assert!(report.bus_up);
    assert_eq!(switch.mqtt().connect_calls, 1);
    assert_eq!(
        payloads(&switch, STATUS),
        vec![("OFF".to_string(), true), ("ON".to_string(), true)]
    );

    switch.tick(now + 20);
    switch.tick(now + 30);
    assert_eq!(payloads(&switch, STATUS).len(), 2);
}

#[test]
fn surviving_session_republishes_after_wifi_outage() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    switch.wifi_mut().status = LinkStatus::Lost;
    let report = switch.tick(now);
    assert_eq!(report.tier, BlinkTier::NoWifi);
    assert!(!report.power_changed);

    switch.wifi_mut().status = LinkStatus::Connected;
    assert!(switch.tick(now + 10).bus_up);
    assert_eq!(
        payloads(&switch, STATUS),
        vec![("OFF".to_string(), true), ("OFF".to_string(), true)]
    );
}

#[test]
fn session_lost_with_wifi_reconnects_and_publishes_current_state() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    switch.wifi_mut().status = LinkStatus::Lost;
    switch.mqtt_mut().connected = false;
    flags.set_power(true);
    switch.tick(now);

    // Back on WiFi, the broker waits for the retry interval (last attempt at 1_010)
    switch.wifi_mut().status = LinkStatus::Connected;
    assert!(!switch.tick(now + 10).bus_up);
    assert_eq!(switch.mqtt().connect_calls, 1);

    switch.tick(61_010);
    assert_eq!(switch.mqtt().connect_calls, 2);
    assert!(switch.tick(61_020).bus_up);
    assert_eq!(payloads(&switch, STATUS).last(), Some(&("ON".to_string(), true)));
    assert_eq!(payloads(&switch, STATUS).len(), 2);
}

// ============================================================================
// Console
// ============================================================================

#[test]
fn long_hold_opens_console_and_portal() {
    let flags = SharedFlags::new();
    let latch = InputLatch::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    assert_eq!(press(&latch, &flags, now, LONG_HOLD_MS), ButtonEvent::LongHold);
    assert!(flags.console());
    assert!(!flags.power());

    let report = switch.tick(now + LONG_HOLD_MS + 10);
    assert_eq!(report.gate, Some(GateTransition::Activated));
    assert!(switch.gate().is_active());
    assert!(switch.console().running);
    assert_eq!(switch.console().start_calls, 1);

    // Another hold closes both transports
    press(&latch, &flags, now + 6_000, LONG_HOLD_MS + 500);
    let report = switch.tick(now + 12_000);
    assert_eq!(report.gate, Some(GateTransition::Deactivated));
    assert!(!switch.console().running);
    assert_eq!(switch.console().stop_calls, 1);
}

#[test]
fn client_gets_banner_and_status() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    flags.set_console(true);
    switch.tick(now);

    switch.console_mut().client = true;
    switch.console_mut().send_line("status");
    let report = switch.tick(now + 10);
    assert_eq!(report.console_lines, 1);

    let console = switch.console();
    assert_eq!(console.output[0], "porch console, type 'help'");
    assert!(console.output_contains("device: porch"));
    assert!(console.output_contains("power: OFF"));
    assert!(console.output_contains("wifi: up"));
    assert!(console.output_contains("mqtt: up"));
}

#[test]
fn console_power_commands_reach_relay() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    flags.set_console(true);
    switch.tick(now);
    switch.console_mut().client = true;
    switch.console_mut().send_line("on");
    let report = switch.tick(now + 10);

    assert!(report.power_changed);
    assert!(switch.relay().energized);
    assert!(switch.console().output_contains("power: ON"));
    assert_eq!(payloads(&switch, STATUS).last(), Some(&("ON".to_string(), true)));
    // Power is not a stored setting
    assert_eq!(switch.store().saves, 0);
}

#[test]
fn broker_change_persists_and_restarts_session() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    flags.set_console(true);
    switch.tick(now);
    switch.console_mut().client = true;
    switch.console_mut().send_line("mqtt-server other.local");
    switch.tick(now + 10);

    assert_eq!(switch.store().saves, 1);
    assert_eq!(switch.mqtt().disconnect_calls, 1);
    assert_eq!(switch.wifi().disconnect_calls, 0);
    // Reconnects in the same pass with the new host
    assert_eq!(switch.mqtt().connect_calls, 2);
    assert_eq!(
        switch.mqtt().last_options.as_ref().map(|o| o.host.as_str()),
        Some("other.local")
    );

    let mut store = switch.store().clone();
    let stored = Settings::load(&mut store);
    assert_eq!(stored.mqtt_server.as_str(), "other.local");
}

#[test]
fn wifi_change_restarts_both_links() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    flags.set_console(true);
    switch.tick(now);
    switch.console_mut().client = true;
    switch.console_mut().send_line("wifi Garage hunter22");
    switch.tick(now + 10);

    assert_eq!(switch.store().saves, 1);
    assert_eq!(switch.wifi().disconnect_calls, 1);
    assert_eq!(switch.mqtt().disconnect_calls, 1);
    assert_eq!(switch.wifi().begin_calls, 2);
    assert_eq!(switch.wifi().last_ssid.as_deref(), Some("Garage"));
}

#[test]
fn bad_command_leaves_settings_alone() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    flags.set_console(true);
    switch.tick(now);
    switch.console_mut().client = true;
    switch.console_mut().send_line("mqtt-port 99999");
    switch.tick(now + 10);

    assert!(switch.console().output_contains("error:"));
    assert_eq!(switch.settings().mqtt_port, 1883);
    assert_eq!(switch.store().saves, 0);
    assert_eq!(switch.mqtt().disconnect_calls, 0);
}

// ============================================================================
// Portal
// ============================================================================

#[test]
fn portal_submission_is_applied() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    flags.set_console(true);
    switch.tick(now);
    assert!(switch.portal_mut().running);

    let submitted = configured().with_mqtt_server("new-broker", 8883);
    switch.portal_mut().submit(submitted.clone());
    switch.tick(now + 10);

    assert_eq!(switch.settings(), &submitted);
    assert_eq!(switch.store().saves, 1);
    assert_eq!(switch.mqtt().disconnect_calls, 1);
    assert_eq!(switch.wifi().disconnect_calls, 0);
}

#[test]
fn unchanged_submission_is_not_saved() {
    let flags = SharedFlags::new();
    let mut switch = switch_with(&flags, &configured());
    let now = bring_up(&mut switch, 1_000);

    flags.set_console(true);
    switch.tick(now);
    switch.portal_mut().submit(configured());
    switch.tick(now + 10);

    assert_eq!(switch.store().saves, 0);
    assert_eq!(switch.mqtt().disconnect_calls, 0);
}
