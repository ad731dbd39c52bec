//! GPIO / peripheral pin assignments for the sensor node board.
//!
//! Single source of truth: every driver references this module rather
//! than hard-coding pin numbers.  Defaults match a generic ESP32 DevKit.

// ---------------------------------------------------------------------------
// Environmental sensor (BME280 / BME680 on I2C0)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Bus clock.  Both sensors support fast mode.
pub const I2C_BAUDRATE_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// `LED_BUILTIN` on the DevKit; held HIGH on a fatal boot fault.
pub const STATUS_LED_GPIO: i32 = 2;
