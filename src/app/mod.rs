//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the sensor node's sequencing and failure policy:
//! the boot sequence and the fixed-period sample-and-publish cycle.
//! All interaction with hardware and the network happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
