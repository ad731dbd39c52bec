//! Host-side chip simulation.
//!
//! Stands in for the I2C chip binding on non-espidf targets.  Readings are
//! injected by the caller; failures can be queued for the next N triggers
//! or fetches to exercise the skip paths of the control loop.  Channels
//! switched off by `apply` read as absent, as they do on the chip.

use crate::error::SensorError;

use super::{RawMeasurement, SensorChip, SensorParams};

#[derive(Debug, Clone)]
pub struct SimChip {
    present: bool,
    reading: RawMeasurement,
    applied: Option<SensorParams>,
    pending_trigger_failures: u32,
    pending_fetch_failures: u32,
    triggered: bool,
    triggers: u32,
}

impl SimChip {
    /// A chip that answers on the bus and returns `reading` on every fetch.
    pub fn new(reading: RawMeasurement) -> Self {
        Self {
            present: true,
            reading,
            applied: None,
            pending_trigger_failures: 0,
            pending_fetch_failures: 0,
            triggered: false,
            triggers: 0,
        }
    }

    /// Nothing wired to the bus.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new(RawMeasurement::default())
        }
    }

    pub fn set_reading(&mut self, reading: RawMeasurement) {
        self.reading = reading;
    }

    pub fn fail_next_triggers(&mut self, n: u32) {
        self.pending_trigger_failures = n;
    }

    pub fn fail_next_fetches(&mut self, n: u32) {
        self.pending_fetch_failures = n;
    }

    /// Parameters written by the last successful `apply`.
    pub fn applied(&self) -> Option<&SensorParams> {
        self.applied.as_ref()
    }

    /// Successful triggers so far.
    pub fn trigger_count(&self) -> u32 {
        self.triggers
    }
}

impl SensorChip for SimChip {
    fn probe(&mut self) -> bool {
        self.present
    }

    fn apply(&mut self, params: &SensorParams) -> Result<(), SensorError> {
        if !self.present {
            return Err(SensorError::NotDetected);
        }
        self.applied = Some(*params);
        Ok(())
    }

    fn trigger(&mut self) -> Result<(), SensorError> {
        if self.applied.is_none() {
            return Err(SensorError::NotReady);
        }
        if self.pending_trigger_failures > 0 {
            self.pending_trigger_failures -= 1;
            return Err(SensorError::NotReady);
        }
        self.triggered = true;
        self.triggers += 1;
        Ok(())
    }

    fn fetch(&mut self) -> Result<RawMeasurement, SensorError> {
        if !core::mem::take(&mut self.triggered) {
            return Err(SensorError::NotReady);
        }
        if self.pending_fetch_failures > 0 {
            self.pending_fetch_failures -= 1;
            return Err(SensorError::Bus);
        }
        Ok(self
            .applied
            .map_or(self.reading, |params| self.reading.masked(&params)))
    }
}
