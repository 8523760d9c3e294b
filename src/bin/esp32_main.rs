//! ESP32-C3 SuperMini relay switch.
//!
//! This is the main entry point for the physical switch. The button
//! interrupt toggles the relay directly; the main loop then:
//! - Opens/closes the configuration console on a long hold
//! - Keeps WiFi and the MQTT session up, retrying once a minute
//! - Applies `on`/`off` commands from the control topic
//! - Publishes the retained power state
//! - Blinks the LED according to connectivity
//!
//! # Build
//!
//! ```bash
//! # Relay + button only (no network)
//! cargo build --release --features esp32 --bin esp32_main
//!
//! # Full: WiFi, MQTT, console and AP portal
//! WIFI_SSID=... WIFI_PASSWORD=... MQTT_HOST=... \
//!     cargo build --release --features esp32-net --bin esp32_main
//! ```

use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use relay_switch::hal::esp32::{pins, Esp32Button, Esp32Clock, Esp32Led, Esp32Relay, LedPin};
use relay_switch::traits::Clock;
use relay_switch::{InputLatch, SharedFlags};
use std::thread;
use std::time::Duration;

/// Main loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 10;

static FLAGS: SharedFlags = SharedFlags::new();
static LATCH: InputLatch = InputLatch::new();

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();
    init_logging();

    log::info!("relay-switch starting");

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Relay, button and LED
    // =========================================================================
    let relay = Esp32Relay::new(pins::RELAY)?;
    let _button = Esp32Button::attach(pins::BUTTON, &LATCH, &FLAGS, relay)?;
    let led = Esp32Led::active_low(PinDriver::output(
        esp_idf_hal::gpio::AnyOutputPin::from(peripherals.pins.gpio8),
    )?);
    log::info!(
        "relay on GPIO{}, button on GPIO{}, LED on GPIO{}",
        pins::RELAY,
        pins::BUTTON,
        pins::LED
    );

    let clock = Esp32Clock::new();

    #[cfg(all(feature = "esp32-http", feature = "esp32-mqtt"))]
    {
        run_networked(peripherals.modem, relay, led, &clock)
    }

    #[cfg(not(all(feature = "esp32-http", feature = "esp32-mqtt")))]
    {
        run_standalone(relay, led, &clock)
    }
}

#[cfg(feature = "wifi")]
fn init_logging() {
    esp_idf_svc::log::EspLogger::initialize_default();
}

#[cfg(not(feature = "wifi"))]
fn init_logging() {
    // No esp-idf-svc logger without the network stack; log output is dropped
}

/// Networked switch: the full main loop.
#[cfg(all(feature = "esp32-http", feature = "esp32-mqtt"))]
fn run_networked(
    modem: esp_idf_hal::modem::Modem,
    relay: Esp32Relay,
    led: Esp32Led<LedPin>,
    clock: &Esp32Clock,
) -> anyhow::Result<()> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use relay_switch::hal::esp32::{
        Esp32Mqtt, Esp32Platform, Esp32Portal, Esp32Wifi, NvsStore, SharedRadio,
        PORTAL_HTTP_PORT,
    };
    use relay_switch::services::{telnet::DEFAULT_CONSOLE_PORT, TcpConsole};
    use relay_switch::{Parts, PowerSwitch};

    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let radio = SharedRadio::new(modem, sysloop, Some(nvs.clone()))?;
    let parts = Parts::<Esp32Platform> {
        relay,
        led,
        wifi: Esp32Wifi::new(radio.clone()),
        mqtt: Esp32Mqtt::new(),
        console: TcpConsole::on_port(DEFAULT_CONSOLE_PORT),
        portal: Esp32Portal::new(radio.clone(), PORTAL_HTTP_PORT),
        store: NvsStore::new(nvs)?,
    };

    let mut switch = PowerSwitch::new(&FLAGS, parts);
    switch.begin();
    log::info!("main loop running ({}ms tick)", LOOP_INTERVAL_MS);

    let mut was_online = false;
    loop {
        let report = switch.tick(clock.now_ms());

        if report.wifi_up != was_online {
            was_online = report.wifi_up;
            if let Some(ip) = radio.ip_addr() {
                log::info!("wifi: address {}", ip);
            }
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}

/// Relay-only switch: the button works, the LED shows "no WiFi".
#[cfg(not(all(feature = "esp32-http", feature = "esp32-mqtt")))]
fn run_standalone(
    mut relay: Esp32Relay,
    mut led: Esp32Led<LedPin>,
    clock: &Esp32Clock,
) -> anyhow::Result<()> {
    use relay_switch::traits::{RelayOutput, StatusLed};
    use relay_switch::{has_elapsed, BlinkTier};

    FLAGS.set_power(false);
    relay.set_energized(false)?;

    let mut applied = false;
    let mut lit = false;
    let mut last_blink = clock.now_ms();
    loop {
        let now = clock.now_ms();

        let power = FLAGS.power();
        if power != applied {
            relay.set_energized(power)?;
            applied = power;
            log::info!("power: {}", if power { "ON" } else { "OFF" });
        }

        if has_elapsed(now, last_blink, BlinkTier::NoWifi.period_ms()) {
            lit = !lit;
            led.set_lit(lit);
            last_blink = now;
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
