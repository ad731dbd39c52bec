//! Bosch BME280 adapter (temperature, pressure, humidity).
//!
//! Runs the chip in forced mode: `begin_reading` triggers one conversion,
//! `end_reading` collects it once the datasheet measurement time has
//! elapsed.  Altitude is derived from pressure and the sea-level reference.

use log::{info, warn};

use super::{
    AcquisitionWindow, Capabilities, Oversampling, Sample, SensorChip, SensorParams,
    SensorVariant, build_sample,
};
use crate::app::ports::EnvironmentalSensor;

/// Maximum measurement time in µs (datasheet appendix B, "max" column).
pub fn conversion_time_us(params: &SensorParams) -> u32 {
    let channel = |os: Oversampling, overhead: u32| match os.factor() {
        0 => 0,
        n => 2_300 * n + overhead,
    };
    1_250
        + channel(params.temperature_oversampling, 0)
        + channel(params.pressure_oversampling, 575)
        + channel(params.humidity_oversampling, 575)
}

pub struct Bme280Adapter<C: SensorChip> {
    chip: C,
    sea_level_hpa: f32,
    conversion_ms: u32,
    configured: bool,
}

impl<C: SensorChip> Bme280Adapter<C> {
    pub fn new(chip: C, sea_level_hpa: f32) -> Self {
        Self {
            chip,
            sea_level_hpa,
            conversion_ms: 0,
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

impl<C: SensorChip> EnvironmentalSensor for Bme280Adapter<C> {
    fn variant(&self) -> SensorVariant {
        SensorVariant::Bme280
    }

    fn capabilities(&self) -> Capabilities {
        SensorVariant::Bme280.capabilities()
    }

    fn configure(&mut self, params: &SensorParams) -> bool {
        if params.variant != SensorVariant::Bme280 || params.gas_heater.is_some() {
            warn!("BME280: parameters are for {}, refusing", params.variant);
            return false;
        }
        if !self.chip.probe() {
            warn!("BME280: no answer at 0x{:02x}", params.i2c_address);
            return false;
        }
        if let Err(e) = self.chip.apply(params) {
            warn!("BME280: configuration write failed: {}", e);
            return false;
        }
        self.conversion_ms = conversion_time_us(params).div_ceil(1_000);
        self.configured = true;
        info!(
            "BME280: T x{} P x{} H x{} filter {} ({} ms/conversion)",
            params.temperature_oversampling.factor(),
            params.pressure_oversampling.factor(),
            params.humidity_oversampling.factor(),
            params.filter_coefficient,
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
                warn!("BME280: trigger failed: {}", e);
                None
            }
        }
    }

    fn end_reading(&mut self, window: AcquisitionWindow, now_ms: u64) -> Option<Sample> {
        if !window.has_elapsed(now_ms) {
            warn!(
                "BME280: collected {} ms early",
                window.remaining_ms(now_ms)
            );
            return None;
        }
        match self.chip.fetch() {
            Ok(raw) => Some(build_sample(&raw, self.capabilities(), self.sea_level_hpa)),
            Err(e) => {
                warn!("BME280: read failed: {}", e);
                None
            }
        }
    }
}
