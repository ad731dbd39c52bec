//! Bosch BME680 adapter (temperature, pressure, humidity, gas resistance).
//!
//! Same forced-mode protocol as the BME280, with a gas conversion appended
//! after the hot plate has been held at its target temperature.  The
//! acquisition window therefore covers the TPH conversion plus the heater
//! duration.

use log::{info, warn};

use super::{
    AcquisitionWindow, Capabilities, Quantity, Sample, SensorChip, SensorParams, SensorVariant,
    build_sample,
};
use crate::app::ports::EnvironmentalSensor;

const HEATER_MIN_C: u16 = 200;
const HEATER_MAX_C: u16 = 400;
const HEATER_MAX_MS: u16 = 4032;

/// TPH + gas profile duration in ms, heater time included.
pub fn conversion_time_ms(params: &SensorParams) -> u32 {
    let cycles = params.temperature_oversampling.factor()
        + params.pressure_oversampling.factor()
        + params.humidity_oversampling.factor();
    // 1963 µs per oversampling cycle, 4 TPH switches, 5 for the gas
    // measurement itself, plus wake-up.
    let tph_us = cycles * 1_963 + 477 * 4 + 477 * 5 + 500;
    let heater_ms = params.gas_heater.map_or(0, |h| u32::from(h.duration_ms));
    tph_us / 1_000 + 1 + heater_ms
}

pub struct Bme680Adapter<C: SensorChip> {
    chip: C,
    sea_level_hpa: f32,
    conversion_ms: u32,
    gas_enabled: bool,
    configured: bool,
}

impl<C: SensorChip> Bme680Adapter<C> {
    pub fn new(chip: C, sea_level_hpa: f32) -> Self {
        Self {
            chip,
            sea_level_hpa,
            conversion_ms: 0,
            gas_enabled: true,
            configured: false,
        }
    }

    pub fn chip(&self) -> &C {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut C {
        &mut self.chip
    }
}

impl<C: SensorChip> EnvironmentalSensor for Bme680Adapter<C> {
    fn variant(&self) -> SensorVariant {
        SensorVariant::Bme680
    }

    /// All five quantities, minus gas resistance when the heater is off.
    fn capabilities(&self) -> Capabilities {
        let all = SensorVariant::Bme680.capabilities();
        if self.gas_enabled {
            all
        } else {
            Capabilities::from_mask(all.mask() & !Quantity::GasResistance.mask())
        }
    }

    fn configure(&mut self, params: &SensorParams) -> bool {
        if params.variant != SensorVariant::Bme680 {
            warn!("BME680: parameters are for {}, refusing", params.variant);
            return false;
        }
        if let Some(h) = params.gas_heater {
            if !(HEATER_MIN_C..=HEATER_MAX_C).contains(&h.target_c) || h.duration_ms > HEATER_MAX_MS
            {
                warn!("BME680: heater profile {}°C/{}ms out of range", h.target_c, h.duration_ms);
                return false;
            }
        }
        if !self.chip.probe() {
            warn!("BME680: no answer at 0x{:02x}", params.i2c_address);
            return false;
        }
        if let Err(e) = self.chip.apply(params) {
            warn!("BME680: configuration write failed: {}", e);
            return false;
        }
        self.gas_enabled = params.gas_heater.is_some();
        self.conversion_ms = conversion_time_ms(params);
        self.configured = true;
        info!(
            "BME680: T x{} P x{} H x{} filter {} heater {:?} ({} ms/conversion)",
            params.temperature_oversampling.factor(),
            params.pressure_oversampling.factor(),
            params.humidity_oversampling.factor(),
            params.filter_coefficient,
            params.gas_heater,
            self.conversion_ms
        );
        true
    }

    fn begin_reading(&mut self, now_ms: u64) -> Option<AcquisitionWindow> {
        if !self.configured {
            return None;
        }
        match self.chip.trigger() {
            Ok(()) => Some(AcquisitionWindow::new(now_ms, self.conversion_ms)),
            Err(e) => {
                warn!("BME680: trigger failed: {}", e);
                None
            }
        }
    }

    fn end_reading(&mut self, window: AcquisitionWindow, now_ms: u64) -> Option<Sample> {
        if !window.has_elapsed(now_ms) {
            warn!(
                "BME680: collected {} ms early",
                window.remaining_ms(now_ms)
            );
            return None;
        }
        match self.chip.fetch() {
            Ok(raw) => Some(build_sample(&raw, self.capabilities(), self.sea_level_hpa)),
            Err(e) => {
                warn!("BME680: read failed: {}", e);
                None
            }
        }
    }
}
