//! Unified error types for the EnvNode firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! boot sequence's error handling uniform.  All variants are `Copy` so they
//! can be carried inside [`AppEvent`](crate::app::events::AppEvent)s and
//! cycle outcomes without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The environmental sensor could not be configured or read.
    Sensor(SensorError),
    /// The wireless link could not be brought up.
    Link(LinkError),
    /// The telemetry backend refused or could not be reached.
    Telemetry(TelemetryError),
    /// Configuration is invalid.
    Config(ConfigError),
    /// `boot()` was called on a node that already left `Booting`.
    AlreadyBooted,
    /// Steady-state operation requested before a successful `boot()`.
    NotBooted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::AlreadyBooted => write!(f, "node already booted"),
            Self::NotBooted => write!(f, "node not booted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Nothing answered on the bus at the configured address.
    NotDetected,
    /// The chip is busy or has not been configured yet.
    NotReady,
    /// Conversion did not complete in time.
    Timeout,
    /// I2C transaction failed.
    Bus,
    /// Requested setting is not supported by this sensor model.
    Unsupported,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetected => write!(f, "no sensor detected"),
            Self::NotReady => write!(f, "sensor not ready"),
            Self::Timeout => write!(f, "conversion timed out"),
            Self::Bus => write!(f, "bus error"),
            Self::Unsupported => write!(f, "setting not supported"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCandidates,
    InvalidSsid,
    InvalidPassword,
    TooManyCandidates,
    /// The boot-time association wait hit its attempt cap.
    GaveUp { attempts: u32 },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCandidates => write!(f, "no access point candidates configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::TooManyCandidates => write!(f, "too many access point candidates"),
            Self::GaveUp { attempts } => write!(f, "no access point after {attempts} attempts"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// TCP connect / DNS failure.
    Connect,
    /// TLS handshake failed (bad clock, wrong root certificate).
    Tls,
    /// Socket I/O failed mid-request.
    Io,
    /// Request timed out.
    Timeout,
    /// Token was rejected (401/403).
    Unauthorized,
    /// Server answered with an unexpected status code.
    Rejected { status: u16 },
    /// Health endpoint reported a non-`pass` status or an unparsable body.
    Unhealthy,
    /// The point carries no fields and cannot be encoded.
    EmptyPoint,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection failed"),
            Self::Tls => write!(f, "TLS handshake failed"),
            Self::Io => write!(f, "I/O error"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Rejected { status } => write!(f, "rejected with HTTP {status}"),
            Self::Unhealthy => write!(f, "backend unhealthy"),
            Self::EmptyPoint => write!(f, "point has no fields"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// A config field failed range validation.
/// The `&'static str` names the field and the rule it broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ValidationFailed(&'static str),
    /// JSON document could not be parsed.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Malformed => write!(f, "malformed config document"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
