//! Sensor subsystem: per-model driver adapters behind one capability interface.
//!
//! The register-level chip driver is a narrow collaborator ([`SensorChip`]);
//! each model adapter ([`bme280::Bme280Adapter`], [`bme680::Bme680Adapter`])
//! implements [`EnvironmentalSensor`](crate::app::ports::EnvironmentalSensor)
//! on top of any chip: configuration validation, conversion-window timing,
//! unit conversion and capability filtering.
//!
//! ```text
//!  Control loop ──▶ EnvironmentalSensor ──▶ Bme280Adapter ──▶ SensorChip
//!                                           Bme680Adapter      (I2C / sim)
//! ```

pub mod bme280;
pub mod bme680;
#[cfg(not(target_os = "espidf"))]
pub mod sim;
#[cfg(target_os = "espidf")]
pub mod esp_bme280;
#[cfg(target_os = "espidf")]
pub mod esp_bme680;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// Sensor model
// ───────────────────────────────────────────────────────────────

/// Supported sensor models, selected at startup from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorVariant {
    Bme280,
    Bme680,
}

impl SensorVariant {
    /// Model name, also the default measurement name on the wire.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bme280 => "BME280",
            Self::Bme680 => "BME680",
        }
    }

    /// Quantities this model can report.
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Bme280 => Capabilities::from_mask(
                Quantity::Temperature.mask()
                    | Quantity::Pressure.mask()
                    | Quantity::Humidity.mask()
                    | Quantity::Altitude.mask(),
            ),
            Self::Bme680 => Capabilities::ALL,
        }
    }

    /// IIR filter coefficients the model's `config` register accepts.
    pub fn supports_filter(self, coefficient: u8) -> bool {
        match self {
            Self::Bme280 => matches!(coefficient, 0 | 2 | 4 | 8 | 16),
            Self::Bme680 => matches!(coefficient, 0 | 1 | 3 | 7 | 15 | 31 | 63 | 127),
        }
    }
}

impl fmt::Display for SensorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ───────────────────────────────────────────────────────────────
// Quantities and capability mask
// ───────────────────────────────────────────────────────────────

/// One measured quantity.  Declaration order is the field order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Quantity {
    Temperature = 0b0000_0001,
    Pressure = 0b0000_0010,
    Humidity = 0b0000_0100,
    GasResistance = 0b0000_1000,
    Altitude = 0b0001_0000,
}

impl Quantity {
    pub const ALL: [Quantity; 5] = [
        Self::Temperature,
        Self::Pressure,
        Self::Humidity,
        Self::GasResistance,
        Self::Altitude,
    ];

    /// Return the bitmask for this quantity.
    pub const fn mask(self) -> u8 {
        self as u8
    }

    /// Field key used in the line protocol.
    pub const fn field_key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Humidity => "humidity",
            Self::GasResistance => "gas_resistance",
            Self::Altitude => "altitude",
        }
    }
}

/// Set of quantities, stored as a bitmask of [`Quantity::mask`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b0001_1111);

    pub const fn from_mask(mask: u8) -> Self {
        Self(mask & Self::ALL.0)
    }

    pub const fn contains(self, q: Quantity) -> bool {
        self.0 & q.mask() != 0
    }

    pub const fn with(self, q: Quantity) -> Self {
        Self(self.0 | q.mask())
    }

    pub const fn mask(self) -> u8 {
        self.0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the contained quantities in wire order.
    pub fn iter(self) -> impl Iterator<Item = Quantity> {
        Quantity::ALL.into_iter().filter(move |q| self.contains(*q))
    }

    pub fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }
}

// ───────────────────────────────────────────────────────────────
// Sampling parameters
// ───────────────────────────────────────────────────────────────

/// Oversampling factor for one quantity (`Skipped` disables it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Oversampling {
    Skipped,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    pub const fn factor(self) -> u32 {
        match self {
            Self::Skipped => 0,
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }
}

/// Gas heater profile (BME680 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasHeater {
    /// Hot-plate target temperature in °C.
    pub target_c: u16,
    /// Heating duration in ms before the gas conversion.
    pub duration_ms: u16,
}

/// Boot-time sampling configuration applied by `configure()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorParams {
    pub variant: SensorVariant,
    /// 7-bit I2C address (0x76 or 0x77).
    pub i2c_address: u8,
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub humidity_oversampling: Oversampling,
    /// IIR filter coefficient, 0 = off.
    pub filter_coefficient: u8,
    pub gas_heater: Option<GasHeater>,
}

impl SensorParams {
    /// Normal-mode BME280 profile: T x8, P x2, H x4, filter off.
    pub const fn bme280() -> Self {
        Self {
            variant: SensorVariant::Bme280,
            i2c_address: 0x76,
            temperature_oversampling: Oversampling::X8,
            pressure_oversampling: Oversampling::X2,
            humidity_oversampling: Oversampling::X4,
            filter_coefficient: 0,
            gas_heater: None,
        }
    }

    /// BME680 profile: T x8, P x4, H x2, filter 3, heater 320 °C for 150 ms.
    pub const fn bme680() -> Self {
        Self {
            variant: SensorVariant::Bme680,
            i2c_address: 0x77,
            temperature_oversampling: Oversampling::X8,
            pressure_oversampling: Oversampling::X4,
            humidity_oversampling: Oversampling::X2,
            filter_coefficient: 3,
            gas_heater: Some(GasHeater {
                target_c: 320,
                duration_ms: 150,
            }),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Sample and acquisition window
// ───────────────────────────────────────────────────────────────

/// Immutable snapshot of one acquisition, in reporting units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// °C
    pub temperature_c: Option<f32>,
    /// hPa
    pub pressure_hpa: Option<f32>,
    /// % relative humidity
    pub humidity_pct: Option<f32>,
    /// kΩ
    pub gas_resistance_kohm: Option<f32>,
    /// m above the configured sea-level reference
    pub altitude_m: Option<f32>,
}

impl Sample {
    pub fn get(&self, q: Quantity) -> Option<f32> {
        match q {
            Quantity::Temperature => self.temperature_c,
            Quantity::Pressure => self.pressure_hpa,
            Quantity::Humidity => self.humidity_pct,
            Quantity::GasResistance => self.gas_resistance_kohm,
            Quantity::Altitude => self.altitude_m,
        }
    }

    /// Quantities actually present in this sample.
    pub fn present(&self) -> Capabilities {
        Quantity::ALL
            .into_iter()
            .filter(|q| self.get(*q).is_some())
            .fold(Capabilities::NONE, Capabilities::with)
    }
}

/// Which half of the two-phase acquisition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPhase {
    Begin,
    End,
}

/// Handle for one in-flight reading.  Deliberately neither `Clone` nor
/// `Copy`: `end_reading` consumes it, so a window can't outlive its cycle.
#[derive(Debug, PartialEq, Eq)]
pub struct AcquisitionWindow {
    started_at_ms: u64,
    conversion_ms: u32,
}

impl AcquisitionWindow {
    pub fn new(started_at_ms: u64, conversion_ms: u32) -> Self {
        Self {
            started_at_ms,
            conversion_ms,
        }
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn conversion_ms(&self) -> u32 {
        self.conversion_ms
    }

    pub fn ready_at_ms(&self) -> u64 {
        self.started_at_ms + u64::from(self.conversion_ms)
    }

    /// Milliseconds still to wait at `now_ms` (0 once elapsed).
    pub fn remaining_ms(&self, now_ms: u64) -> u32 {
        self.ready_at_ms().saturating_sub(now_ms) as u32
    }

    pub fn has_elapsed(&self, now_ms: u64) -> bool {
        now_ms >= self.ready_at_ms()
    }
}

// ───────────────────────────────────────────────────────────────
// Chip collaborator
// ───────────────────────────────────────────────────────────────

/// Compensated output of one forced-mode conversion, in chip units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMeasurement {
    /// °C
    pub temperature_c: f32,
    /// Pa
    pub pressure_pa: f32,
    /// %RH, `None` when the humidity channel is skipped.
    pub humidity_pct: Option<f32>,
    /// Ω, `None` when no gas conversion ran or the heater was not stable.
    pub gas_ohms: Option<f32>,
}

impl RawMeasurement {
    /// Drop the channels `params` switched off.  Chip drivers still return
    /// a number for a skipped humidity channel; it is meaningless.
    pub fn masked(self, params: &SensorParams) -> Self {
        Self {
            humidity_pct: self
                .humidity_pct
                .filter(|_| params.humidity_oversampling != Oversampling::Skipped),
            gas_ohms: self.gas_ohms.filter(|_| params.gas_heater.is_some()),
            ..self
        }
    }
}

/// Register-level chip access (I2C transactions, compensation).
///
/// Implemented by the device binding and by the host simulation; the
/// model adapters never touch the bus directly.
pub trait SensorChip {
    /// Check the chip answers with the expected ID.
    fn probe(&mut self) -> bool;

    /// Write oversampling, filter and heater registers.
    fn apply(&mut self, params: &SensorParams) -> Result<(), SensorError>;

    /// Start one forced-mode conversion.
    fn trigger(&mut self) -> Result<(), SensorError>;

    /// Read back the finished conversion.
    fn fetch(&mut self) -> Result<RawMeasurement, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Conversions
// ───────────────────────────────────────────────────────────────

pub fn pa_to_hpa(pa: f32) -> f32 {
    pa / 100.0
}

pub fn ohms_to_kohms(ohms: f32) -> f32 {
    ohms / 1000.0
}

/// Barometric altitude in metres from station pressure and the sea-level
/// reference, both in hPa.
pub fn altitude_m(pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
    44_330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903))
}

/// Turn a raw measurement into a [`Sample`], keeping only quantities in `caps`.
pub(crate) fn build_sample(raw: &RawMeasurement, caps: Capabilities, sea_level_hpa: f32) -> Sample {
    let pressure_hpa = pa_to_hpa(raw.pressure_pa);
    let keep = |q: Quantity, v: Option<f32>| if caps.contains(q) { v } else { None };

    Sample {
        temperature_c: keep(Quantity::Temperature, Some(raw.temperature_c)),
        pressure_hpa: keep(Quantity::Pressure, Some(pressure_hpa)),
        humidity_pct: keep(Quantity::Humidity, raw.humidity_pct),
        gas_resistance_kohm: keep(Quantity::GasResistance, raw.gas_ohms.map(ohms_to_kohms)),
        altitude_m: keep(
            Quantity::Altitude,
            Some(altitude_m(pressure_hpa, sea_level_hpa)),
        ),
    }
}
