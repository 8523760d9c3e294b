//! Push button wired to a GPIO interrupt.
//!
//! The button pulls the line to ground; the internal pull-up holds it high
//! when released. Both edges fire the interrupt, which reads the level and
//! feeds it straight into the [`InputLatch`]. Debouncing and press
//! classification happen there.
//!
//! # Wiring
//!
//! - One side → button GPIO
//! - Other side → GND

use core::ffi::c_void;

use esp_idf_hal::sys::{
    esp, gpio_config, gpio_config_t, gpio_get_level, gpio_install_isr_service,
    gpio_int_type_t_GPIO_INTR_ANYEDGE, gpio_isr_handler_add, gpio_mode_t_GPIO_MODE_INPUT,
    gpio_pulldown_t_GPIO_PULLDOWN_DISABLE, gpio_pullup_t_GPIO_PULLUP_ENABLE, EspError,
    ESP_ERR_INVALID_STATE,
};

use super::clock::uptime_ms;
use super::relay::Esp32Relay;
use crate::flags::SharedFlags;
use crate::input::InputLatch;

/// Everything the interrupt handler touches. Lives for the rest of the run.
struct IsrContext {
    pin: i32,
    latch: &'static InputLatch,
    flags: &'static SharedFlags,
    relay: Esp32Relay,
}

unsafe extern "C" fn on_button_edge(arg: *mut c_void) {
    let ctx = &*(arg as *const IsrContext);
    let contact_low = gpio_get_level(ctx.pin) == 0;
    let mut relay = ctx.relay;
    ctx.latch
        .on_edge(contact_low, uptime_ms(), ctx.flags, &mut relay);
}

/// Registered button interrupt.
#[derive(Debug)]
pub struct Esp32Button {
    pin: i32,
}

impl Esp32Button {
    /// Configure `pin` as a pulled-up input and route both edges to `latch`.
    ///
    /// `relay` is written from the interrupt on a short press.
    pub fn attach(
        pin: i32,
        latch: &'static InputLatch,
        flags: &'static SharedFlags,
        relay: Esp32Relay,
    ) -> Result<Self, EspError> {
        let config = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
            ..Default::default()
        };
        esp!(unsafe { gpio_config(&config) })?;

        // Another driver may already have installed the shared ISR service
        let installed = unsafe { gpio_install_isr_service(0) };
        if installed != ESP_ERR_INVALID_STATE as i32 {
            esp!(installed)?;
        }

        // Registered once per boot, never freed
        let ctx: &'static IsrContext = Box::leak(Box::new(IsrContext {
            pin,
            latch,
            flags,
            relay,
        }));
        esp!(unsafe {
            gpio_isr_handler_add(
                pin,
                Some(on_button_edge),
                ctx as *const IsrContext as *mut c_void,
            )
        })?;

        log::info!("button: interrupt on GPIO{}", pin);
        Ok(Self { pin })
    }

    /// GPIO number.
    pub fn pin(&self) -> i32 {
        self.pin
    }
}
