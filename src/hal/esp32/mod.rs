//! ESP32 hardware abstraction layer for the relay switch.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini (RISC-V 160MHz, 4MB Flash)
//! - **Relay**: single-channel relay module, active high
//! - **Button**: momentary push button to ground
//! - **LED**: on-board blue LED, active low
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments matching the SuperMini layout.

mod button;
mod clock;
mod relay;

pub use button::Esp32Button;
pub use clock::{uptime_ms, Esp32Clock};
pub use relay::{Esp32Led, Esp32Relay};

#[cfg(feature = "wifi")]
mod nvs;
#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use nvs::{NvsStore, NVS_NAMESPACE};
#[cfg(feature = "wifi")]
pub use wifi::{Esp32Wifi, SharedRadio};

#[cfg(feature = "esp32-http")]
mod portal;
#[cfg(feature = "esp32-http")]
pub use portal::{Esp32Portal, Esp32PortalError};

#[cfg(feature = "esp32-mqtt")]
mod mqtt;
#[cfg(feature = "esp32-mqtt")]
pub use mqtt::{Esp32Mqtt, Esp32MqttError};

/// GPIO driver behind the status LED.
pub type LedPin = esp_idf_hal::gpio::PinDriver<
    'static,
    esp_idf_hal::gpio::AnyOutputPin,
    esp_idf_hal::gpio::Output,
>;

/// HTTP port of the configuration portal.
pub const PORTAL_HTTP_PORT: u16 = 80;

/// Platform bundle for the networked ESP32 build.
///
/// The console is the std TCP console, which runs unchanged on ESP-IDF.
#[cfg(all(feature = "esp32-http", feature = "esp32-mqtt"))]
#[derive(Debug, Clone, Copy)]
pub struct Esp32Platform;

#[cfg(all(feature = "esp32-http", feature = "esp32-mqtt"))]
impl crate::traits::Platform for Esp32Platform {
    type Relay = Esp32Relay;
    type Led = Esp32Led<LedPin>;
    type Wifi = Esp32Wifi;
    type Mqtt = Esp32Mqtt;
    type Console = crate::services::TcpConsole;
    type Portal = Esp32Portal;
    type Store = NvsStore;
}

/// Pin assignments for SuperMini ESP32-C3.
pub mod pins {
    /// Relay driver input
    pub const RELAY: i32 = 2;

    /// Push button (active low, internal pull-up)
    pub const BUTTON: i32 = 3;

    /// On-board blue LED (active low)
    pub const LED: i32 = 8;
}
