//! On-board status LED driver.
//!
//! A single GPIO-driven LED (`LED_BUILTIN`).  Held on, it is the node's
//! only fault signal: no sensor answered at boot and the firmware halted.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the pin through `esp_idf_hal::gpio::PinDriver`.
//! On host/test: tracks state in-memory only.

use log::warn;

#[cfg(target_os = "espidf")]
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use crate::app::ports::FaultIndicator;

pub struct StatusLed {
    on: bool,
    latched: bool,
    #[cfg(target_os = "espidf")]
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl StatusLed {
    #[cfg(target_os = "espidf")]
    pub fn new(pin: PinDriver<'static, AnyOutputPin, Output>) -> Self {
        let mut led = Self {
            on: true,
            latched: false,
            pin,
        };
        led.set(false);
        led
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            on: false,
            latched: false,
        }
    }

    /// Drive the LED.  Ignored once a fault has been latched.
    pub fn set(&mut self, on: bool) {
        if self.latched || self.on == on {
            return;
        }
        self.platform_write(on);
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn is_fault_latched(&self) -> bool {
        self.latched
    }

    #[cfg(target_os = "espidf")]
    fn platform_write(&mut self, on: bool) {
        let r = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = r {
            warn!("LED: GPIO write failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_write(&mut self, _on: bool) {}
}

#[cfg(not(target_os = "espidf"))]
impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultIndicator for StatusLed {
    fn hold_fault(&mut self) {
        warn!("LED: fault latched");
        self.set(true);
        self.latched = true;
    }
}
