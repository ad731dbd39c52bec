//! ESP-IDF chip binding for the BME680.
//!
//! The `bme680` crate is written against embedded-hal 0.2, so the bus is
//! passed through [`I2cCompat`] and FreeRTOS delays are adapted to the 0.2
//! `DelayMs` trait.  Unlike the BME280 binding the conversion really is
//! split: `trigger` puts the chip into forced mode and returns, the heater
//! and TPH conversion run while the acquisition window is awaited, and
//! `fetch` only reads the result registers.

use core::time::Duration;

use ::bme680::{
    Bme680, FieldDataCondition, I2CAddress, IIRFilterSize, OversamplingSetting, PowerMode,
    SettingsBuilder,
};
use embedded_hal::i2c::I2c;
use embedded_hal_0_2::blocking::delay::DelayMs;
use embedded_hal_0_2::blocking::i2c::{Read, Write};
use esp_idf_hal::delay::FreeRtos;
use log::warn;

use crate::error::SensorError;

use super::{Oversampling, RawMeasurement, SensorChip, SensorParams};

/// Ambient temperature assumed for the first heater resistance value.
const AMBIENT_C: i8 = 25;

/// embedded-hal 1.0 bus seen through the 0.2 blocking traits.
pub struct I2cCompat<B>(pub B);

impl<B: I2c> Write for I2cCompat<B> {
    type Error = B::Error;
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.write(addr, bytes)
    }
}

impl<B: I2c> Read for I2cCompat<B> {
    type Error = B::Error;
    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.0.read(addr, buffer)
    }
}

/// FreeRTOS task delay behind the 0.2 `DelayMs<u8>` trait.
pub struct RtosDelay;

impl DelayMs<u8> for RtosDelay {
    fn delay_ms(&mut self, ms: u8) {
        FreeRtos::delay_ms(u32::from(ms));
    }
}

enum State<B> {
    Unprobed { bus: B, address: u8 },
    Ready(Bme680<I2cCompat<B>, RtosDelay>),
    /// Bus handed to a failed init; nothing left to talk to.
    Lost,
}

pub struct EspBme680Chip<B> {
    state: State<B>,
    params: SensorParams,
    triggered: bool,
}

impl<B: I2c> EspBme680Chip<B> {
    pub fn new(i2c: B, address: u8) -> Self {
        Self {
            state: State::Unprobed { bus: i2c, address },
            params: SensorParams::bme680(),
            triggered: false,
        }
    }

    fn dev(&mut self) -> Result<&mut Bme680<I2cCompat<B>, RtosDelay>, SensorError> {
        match &mut self.state {
            State::Ready(dev) => Ok(dev),
            _ => Err(SensorError::NotReady),
        }
    }
}

fn oversampling(os: Oversampling) -> OversamplingSetting {
    match os {
        Oversampling::Skipped => OversamplingSetting::OSNone,
        Oversampling::X1 => OversamplingSetting::OS1x,
        Oversampling::X2 => OversamplingSetting::OS2x,
        Oversampling::X4 => OversamplingSetting::OS4x,
        Oversampling::X8 => OversamplingSetting::OS8x,
        Oversampling::X16 => OversamplingSetting::OS16x,
    }
}

fn filter(coefficient: u8) -> Result<IIRFilterSize, SensorError> {
    match coefficient {
        0 => Ok(IIRFilterSize::Size0),
        1 => Ok(IIRFilterSize::Size1),
        3 => Ok(IIRFilterSize::Size3),
        7 => Ok(IIRFilterSize::Size7),
        15 => Ok(IIRFilterSize::Size15),
        31 => Ok(IIRFilterSize::Size31),
        63 => Ok(IIRFilterSize::Size63),
        127 => Ok(IIRFilterSize::Size127),
        _ => Err(SensorError::Unsupported),
    }
}

impl<B: I2c> SensorChip for EspBme680Chip<B> {
    fn probe(&mut self) -> bool {
        let (bus, address) = match core::mem::replace(&mut self.state, State::Lost) {
            State::Unprobed { bus, address } => (bus, address),
            ready @ State::Ready(_) => {
                self.state = ready;
                return true;
            }
            State::Lost => return false,
        };
        let addr = match address {
            0x76 => I2CAddress::Primary,
            0x77 => I2CAddress::Secondary,
            other => I2CAddress::Other(other),
        };
        match Bme680::init(I2cCompat(bus), &mut RtosDelay, addr) {
            Ok(dev) => {
                self.state = State::Ready(dev);
                true
            }
            Err(e) => {
                warn!("BME680(esp): init failed: {:?}", e);
                false
            }
        }
    }

    fn apply(&mut self, params: &SensorParams) -> Result<(), SensorError> {
        let mut builder = SettingsBuilder::new()
            .with_temperature_oversampling(oversampling(params.temperature_oversampling))
            .with_pressure_oversampling(oversampling(params.pressure_oversampling))
            .with_humidity_oversampling(oversampling(params.humidity_oversampling))
            .with_temperature_filter(filter(params.filter_coefficient)?)
            .with_run_gas(params.gas_heater.is_some());
        if let Some(h) = params.gas_heater {
            builder = builder.with_gas_measurement(
                Duration::from_millis(u64::from(h.duration_ms)),
                h.target_c,
                AMBIENT_C,
            );
        }
        let settings = builder.build();

        let dev = self.dev()?;
        dev.set_sensor_settings(&mut RtosDelay, settings)
            .map_err(|e| {
                warn!("BME680(esp): settings rejected: {:?}", e);
                SensorError::Bus
            })?;
        self.params = *params;
        Ok(())
    }

    fn trigger(&mut self) -> Result<(), SensorError> {
        self.triggered = false;
        self.dev()?
            .set_sensor_mode(&mut RtosDelay, PowerMode::ForcedMode)
            .map_err(|_| SensorError::Bus)?;
        self.triggered = true;
        Ok(())
    }

    fn fetch(&mut self) -> Result<RawMeasurement, SensorError> {
        if !core::mem::take(&mut self.triggered) {
            return Err(SensorError::NotReady);
        }
        let (data, condition) = self
            .dev()?
            .get_sensor_data(&mut RtosDelay)
            .map_err(|_| SensorError::Bus)?;
        if matches!(condition, FieldDataCondition::Unchanged) {
            return Err(SensorError::Timeout);
        }
        Ok(RawMeasurement {
            temperature_c: data.temperature_celsius(),
            pressure_pa: data.pressure_hpa() * 100.0,
            humidity_pct: Some(data.humidity_percent()),
            gas_ohms: Some(data.gas_resistance_ohm() as f32),
        }
        .masked(&self.params))
    }
}
