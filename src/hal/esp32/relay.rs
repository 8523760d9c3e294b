//! Relay output and status LED.
//!
//! The relay is written both from the main loop and from the button
//! interrupt, so [`Esp32Relay`] is a `Copy` handle around the pin number and
//! drives the line through the ISR-safe `gpio_set_level`.

use embedded_hal::digital::OutputPin;
use esp_idf_hal::sys::{
    esp, gpio_config, gpio_config_t, gpio_int_type_t_GPIO_INTR_DISABLE, gpio_mode_t_GPIO_MODE_OUTPUT,
    gpio_pulldown_t_GPIO_PULLDOWN_DISABLE, gpio_pullup_t_GPIO_PULLUP_DISABLE, gpio_set_level,
    EspError,
};

use crate::traits::{RelayOutput, StatusLed};

/// Relay driver line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Esp32Relay {
    pin: i32,
}

impl Esp32Relay {
    /// Configure `pin` as a push-pull output, driven low (relay off).
    pub fn new(pin: i32) -> Result<Self, EspError> {
        let config = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            ..Default::default()
        };
        esp!(unsafe { gpio_config(&config) })?;
        let mut relay = Self { pin };
        relay.set_energized(false)?;
        Ok(relay)
    }

    /// GPIO number.
    pub fn pin(&self) -> i32 {
        self.pin
    }
}

impl RelayOutput for Esp32Relay {
    type Error = EspError;

    #[inline]
    fn set_energized(&mut self, on: bool) -> Result<(), EspError> {
        // Register write only; safe from the button interrupt
        esp!(unsafe { gpio_set_level(self.pin, u32::from(on)) })
    }
}

/// Status LED on any `embedded-hal` output pin.
pub struct Esp32Led<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> Esp32Led<P> {
    /// LED lit when the pin is driven high.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
        }
    }

    /// LED lit when the pin is driven low (most on-board LEDs).
    pub fn active_low(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
        }
    }
}

impl<P: OutputPin> StatusLed for Esp32Led<P> {
    fn set_lit(&mut self, lit: bool) {
        // Indicator only, write errors are dropped
        let _ = if lit != self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}
