//! EnvNode firmware library.
//!
//! Exposes the control loop, ports and adapters for integration testing.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; every other target gets simulation stubs.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod point;
pub mod sensors;
