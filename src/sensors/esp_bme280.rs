//! ESP-IDF chip binding for the BME280.
//!
//! Generic over any `embedded_hal::i2c::I2c` bus; on the device that is
//! the `esp-idf-hal` `I2cDriver`.
//!
//! Register access and compensation come from the `bme280` crate; this
//! file only maps [`SensorParams`] onto its configuration and surfaces
//! errors as [`SensorError`].  The crate runs a forced conversion as one
//! call, so `trigger` does the whole conversion on a FreeRTOS delay (the
//! task yields while the chip converts) and `fetch` hands out the result
//! once the acquisition window has been awaited.

use ::bme280::i2c::BME280;
use ::bme280::{Configuration, IIRFilter, Oversampling as ChipOversampling};
use embedded_hal::i2c::I2c;
use esp_idf_hal::delay::FreeRtos;
use log::warn;

use crate::error::SensorError;

use super::{Oversampling, RawMeasurement, SensorChip, SensorParams};

pub struct EspBme280Chip<B> {
    dev: BME280<B>,
    params: SensorParams,
    pending: Option<RawMeasurement>,
}

impl<B: I2c> EspBme280Chip<B> {
    pub fn new(i2c: B, address: u8) -> Self {
        Self {
            dev: BME280::new(i2c, address),
            params: SensorParams::bme280(),
            pending: None,
        }
    }
}

fn oversampling(os: Oversampling) -> ChipOversampling {
    match os {
        Oversampling::Skipped => ChipOversampling::Oversampling0X,
        Oversampling::X1 => ChipOversampling::Oversampling1X,
        Oversampling::X2 => ChipOversampling::Oversampling2X,
        Oversampling::X4 => ChipOversampling::Oversampling4X,
        Oversampling::X8 => ChipOversampling::Oversampling8X,
        Oversampling::X16 => ChipOversampling::Oversampling16X,
    }
}

fn filter(coefficient: u8) -> Result<IIRFilter, SensorError> {
    match coefficient {
        0 => Ok(IIRFilter::Off),
        2 => Ok(IIRFilter::Coefficient2),
        4 => Ok(IIRFilter::Coefficient4),
        8 => Ok(IIRFilter::Coefficient8),
        16 => Ok(IIRFilter::Coefficient16),
        _ => Err(SensorError::Unsupported),
    }
}

impl<B: I2c> SensorChip for EspBme280Chip<B> {
    fn probe(&mut self) -> bool {
        match self.dev.init(&mut FreeRtos) {
            Ok(()) => true,
            Err(e) => {
                warn!("BME280(esp): init failed: {:?}", e);
                false
            }
        }
    }

    fn apply(&mut self, params: &SensorParams) -> Result<(), SensorError> {
        let config = Configuration::default()
            .with_temperature_oversampling(oversampling(params.temperature_oversampling))
            .with_pressure_oversampling(oversampling(params.pressure_oversampling))
            .with_humidity_oversampling(oversampling(params.humidity_oversampling))
            .with_iir_filter(filter(params.filter_coefficient)?);
        self.dev
            .init_with_config(&mut FreeRtos, config)
            .map_err(|_| SensorError::Bus)?;
        self.params = *params;
        Ok(())
    }

    fn trigger(&mut self) -> Result<(), SensorError> {
        self.pending = None;
        let m = self.dev.measure(&mut FreeRtos).map_err(|e| {
            warn!("BME280(esp): forced conversion failed: {:?}", e);
            SensorError::Bus
        })?;
        self.pending = Some(
            RawMeasurement {
                temperature_c: m.temperature,
                pressure_pa: m.pressure,
                humidity_pct: Some(m.humidity),
                gas_ohms: None,
            }
            .masked(&self.params),
        );
        Ok(())
    }

    fn fetch(&mut self) -> Result<RawMeasurement, SensorError> {
        self.pending.take().ok_or(SensorError::NotReady)
    }
}
