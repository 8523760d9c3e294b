//! Desktop switch for trying the console, portal and MQTT integration.
//!
//! Runs the full switch loop with a simulated relay and button:
//! - Type `p` + Enter for a short press (toggle power)
//! - Type `h` + Enter for a five second hold (open/close the console)
//! - With the console open, `telnet localhost 2323` and type `help`
//! - The settings form is at http://localhost:8080 while the console is open
//!
//! Power commands arrive on the control topic (`on` / `off`) once a broker
//! is configured, e.g. through the console: `mqtt-server localhost`,
//! `control-topic desk/set`, `status-topic desk/state`.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=info cargo run --example desktop_switch --features web,mqtt
//! ```
//!
//! Settings persist in `desktop-switch.bin` in the working directory.

use std::io::BufRead;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use relay_switch::clock::truncate_ms;
use relay_switch::hal::{MockLed, MockWifi};
use relay_switch::services::{FileStore, RumqttcClient, TcpConsole, WebPortal, WebPortalConfig};
use relay_switch::traits::RelayOutput;
use relay_switch::{
    ButtonEvent, InputLatch, Parts, Platform, PowerSwitch, Settings, SettingsStore, SharedFlags,
    Timestamp, LONG_HOLD_MS,
};

/// Main loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 10;

/// Console port (23 needs privileges on most desktops)
const CONSOLE_PORT: u16 = 2323;

/// Settings file
const STORE_PATH: &str = "desktop-switch.bin";

static FLAGS: SharedFlags = SharedFlags::new();
static LATCH: InputLatch = InputLatch::new();

/// Relay that logs its state instead of switching anything.
#[derive(Debug, Default, Clone, Copy)]
struct LoggedRelay;

impl RelayOutput for LoggedRelay {
    type Error = core::convert::Infallible;

    fn set_energized(&mut self, on: bool) -> Result<(), Self::Error> {
        log::info!("relay: {}", if on { "ENERGIZED" } else { "released" });
        Ok(())
    }
}

/// Desktop bundle: real network transports, simulated hardware.
///
/// The host is already on a network, so WiFi is a station that
/// associates immediately.
struct DesktopPlatform;

impl Platform for DesktopPlatform {
    type Relay = LoggedRelay;
    type Led = MockLed;
    type Wifi = MockWifi;
    type Mqtt = RumqttcClient;
    type Console = TcpConsole;
    type Portal = WebPortal;
    type Store = FileStore;
}

/// Simulated button presses read from stdin.
fn spawn_button_reader() -> Receiver<char> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if let Some(c) = line.trim().chars().next() {
                if tx.send(c).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

/// Feed one press of `hold_ms` through the latch, as the interrupt would.
fn press(at: Timestamp, hold_ms: u32) -> ButtonEvent {
    let mut relay = LoggedRelay;
    LATCH.on_edge(true, at, &FLAGS, &mut relay);
    LATCH.on_edge(false, at.wrapping_add(hold_ms), &FLAGS, &mut relay)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=================================");
    println!("  relay-switch Desktop");
    println!("=================================");
    println!();

    // Seed the store on first run so WiFi counts as configured
    let mut store = FileStore::new(STORE_PATH);
    let mut probe = [0u8; 1];
    if store.load(&mut probe)? == 0 {
        Settings::default()
            .with_device_name("desktop-switch")
            .with_wifi("host-network", "")
            .save(&mut store)?;
    }

    let parts = Parts::<DesktopPlatform> {
        relay: LoggedRelay,
        led: MockLed::new(),
        wifi: MockWifi::instant(),
        mqtt: RumqttcClient::new(),
        console: TcpConsole::on_port(CONSOLE_PORT),
        portal: WebPortal::new(WebPortalConfig::default()),
        store,
    };

    let mut switch = PowerSwitch::new(&FLAGS, parts);
    switch.begin();

    println!("Controls:");
    println!("  p + Enter:   short press (toggle power)");
    println!("  h + Enter:   long hold (open/close console)");
    println!("  Console:     telnet localhost {}", CONSOLE_PORT);
    println!("  Portal:      http://localhost:8080 (while console is open)");
    println!();

    let started = Instant::now();
    let now = || truncate_ms(started.elapsed().as_millis() as u64);
    let buttons = spawn_button_reader();

    loop {
        match buttons.try_recv() {
            Ok('p') => {
                let event = press(now(), 200);
                log::info!("button: {:?}", event);
            }
            Ok('h') => {
                let event = press(now(), LONG_HOLD_MS);
                log::info!("button: {:?}", event);
            }
            Ok(other) => println!("unknown key '{}', use p or h", other),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                log::info!("stdin closed, exiting");
                return Ok(());
            }
        }

        let report = switch.tick(now());
        if report.power_changed {
            println!("power: {}", if switch.applied_power() { "ON" } else { "OFF" });
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
