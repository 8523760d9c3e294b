//! WiFi station management for ESP32.
//!
//! The radio is shared between the station driver and the configuration
//! portal: while the portal is up the radio runs in mixed mode with an open
//! access point named after the device. Both hold a [`SharedRadio`].
//!
//! # Example
//!
//! ```ignore
//! use relay_switch::hal::esp32::{Esp32Wifi, SharedRadio};
//! use relay_switch::traits::WifiDriver;
//!
//! let radio = SharedRadio::new(peripherals.modem, sysloop, Some(nvs))?;
//! let mut wifi = Esp32Wifi::new(radio.clone());
//! wifi.begin("MyNetwork", "secret123")?;
//! // returns immediately; poll wifi.status() from the main loop
//! ```

use std::cell::Cell;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};
use esp_idf_hal::sys::EspError;

use crate::traits::{LinkStatus, WifiDriver};

struct Radio {
    wifi: EspWifi<'static>,
    client: ClientConfiguration,
    access_point: Option<AccessPointConfiguration>,
}

impl Radio {
    fn configuration(&self) -> Configuration {
        match &self.access_point {
            Some(ap) => Configuration::Mixed(self.client.clone(), ap.clone()),
            None => Configuration::Client(self.client.clone()),
        }
    }

    fn apply(&mut self) -> Result<(), EspError> {
        let config = self.configuration();
        self.wifi.set_configuration(&config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        Ok(())
    }
}

/// Handle to the WiFi radio shared by the station driver and the portal.
#[derive(Clone)]
pub struct SharedRadio {
    inner: Arc<Mutex<Radio>>,
}

impl SharedRadio {
    /// Take the modem and bring up the driver, not yet started.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> anyhow::Result<Self> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Radio {
                wifi,
                client: ClientConfiguration::default(),
                access_point: None,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Radio> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open an access point named `ssid` alongside the station.
    pub fn open_access_point(&self, ssid: &str) -> Result<(), EspError> {
        let mut ap_ssid: heapless::String<32> = heapless::String::new();
        for c in ssid.chars() {
            if ap_ssid.push(c).is_err() {
                break;
            }
        }
        let mut radio = self.lock();
        radio.access_point = Some(AccessPointConfiguration {
            ssid: ap_ssid,
            auth_method: AuthMethod::None,
            ..Default::default()
        });
        radio.apply()
    }

    /// Drop the access point and return to station-only mode.
    pub fn close_access_point(&self) -> Result<(), EspError> {
        let mut radio = self.lock();
        if radio.access_point.take().is_some() {
            radio.apply()?;
        }
        Ok(())
    }

    /// Number of stations associated with the access point.
    pub fn access_point_clients(&self) -> usize {
        if self.lock().access_point.is_none() {
            return 0;
        }
        let mut list = esp_idf_hal::sys::wifi_sta_list_t::default();
        // Plain query of the driver's station table
        let err = unsafe { esp_idf_hal::sys::esp_wifi_ap_get_sta_list(&mut list) };
        if err == esp_idf_hal::sys::ESP_OK as i32 {
            list.num as usize
        } else {
            0
        }
    }

    /// Station IP address, if associated and DHCP is done.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.lock()
            .wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }
}

/// Non-blocking WiFi station driver.
///
/// [`WifiDriver::begin`] configures the station and starts association;
/// the supervisor watches [`WifiDriver::status`] for the outcome.
pub struct Esp32Wifi {
    radio: SharedRadio,
    attempted: bool,
    was_up: Cell<bool>,
}

impl Esp32Wifi {
    /// Station driver on `radio`.
    pub fn new(radio: SharedRadio) -> Self {
        Self {
            radio,
            attempted: false,
            was_up: Cell::new(false),
        }
    }

    /// Get the current IP address, if connected.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.radio.ip_addr()
    }

    fn link_up(&self) -> bool {
        let radio = self.radio.lock();
        radio.wifi.is_connected().unwrap_or(false) && radio.wifi.is_up().unwrap_or(false)
    }
}

impl WifiDriver for Esp32Wifi {
    type Error = EspError;

    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), EspError> {
        // Create heapless strings for esp-idf
        let mut ssid_buf: heapless::String<32> = heapless::String::new();
        let _ = ssid_buf.push_str(ssid);

        let mut pass_buf: heapless::String<64> = heapless::String::new();
        let _ = pass_buf.push_str(password);

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let mut radio = self.radio.lock();
        radio.client = ClientConfiguration {
            ssid: ssid_buf,
            password: pass_buf,
            auth_method,
            ..Default::default()
        };
        radio.apply()?;

        log::info!("wifi: associating with '{}'", ssid);
        self.attempted = true;
        self.was_up.set(false);
        radio.wifi.connect()
    }

    fn disconnect(&mut self) {
        let mut radio = self.radio.lock();
        if let Err(e) = radio.wifi.disconnect() {
            log::debug!("wifi: disconnect: {:?}", e);
        }
        self.attempted = false;
        self.was_up.set(false);
    }

    fn status(&self) -> LinkStatus {
        if self.link_up() {
            self.was_up.set(true);
            LinkStatus::Connected
        } else if self.was_up.get() {
            LinkStatus::Lost
        } else if self.attempted {
            LinkStatus::Connecting
        } else {
            LinkStatus::Idle
        }
    }

    fn is_connected(&self) -> bool {
        self.link_up()
    }
}
