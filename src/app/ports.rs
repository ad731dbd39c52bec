//! Port traits: the hexagonal boundary between the control loop and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (radio, SNTP, sensor, backend client, LED, event sinks)
//! implement these traits.  [`NodeService`](super::service::NodeService)
//! consumes them via generics, so the control loop never touches hardware
//! or sockets directly and runs unchanged against host mocks.

use crate::error::TelemetryError;
use crate::point::DataPoint;
use crate::sensors::{AcquisitionWindow, Capabilities, Sample, SensorParams, SensorVariant};

// ───────────────────────────────────────────────────────────────
// Link port (connectivity manager)
// ───────────────────────────────────────────────────────────────

/// Association state of the wireless link.  Polled, never pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

impl LinkState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

pub trait LinkPort {
    /// Return immediately when associated; otherwise make one association
    /// attempt across the configured candidates and report the result.
    fn ensure_connected(&mut self) -> LinkState;

    /// Signal strength of the current association, if any.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Time ports
// ───────────────────────────────────────────────────────────────

/// One-shot wall-clock synchronisation.  Has no error channel: a failed
/// sync surfaces later as a TLS validation failure.
pub trait TimeSyncPort {
    fn sync_time(&mut self, tz: &str, servers: &[&str]);
}

pub trait ClockPort {
    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;

    /// Wall-clock Unix time in nanoseconds, `None` until the clock is
    /// plausible (after 2020-01-01).
    fn unix_nanos(&self) -> Option<i64>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (sensor driver adapter)
// ───────────────────────────────────────────────────────────────

/// Capability interface every sensor model implements.
pub trait EnvironmentalSensor {
    fn variant(&self) -> SensorVariant;

    /// Quantities a successful [`end_reading`](Self::end_reading) reports.
    fn capabilities(&self) -> Capabilities;

    /// Apply sampling parameters.  `false` when no sensor answers or the
    /// parameters do not fit this model.
    fn configure(&mut self, params: &SensorParams) -> bool;

    /// Start one acquisition.  `None` when the driver cannot start.
    fn begin_reading(&mut self, now_ms: u64) -> Option<AcquisitionWindow>;

    /// Collect the acquisition.  `None` on failure, including a call made
    /// before the window has elapsed.
    fn end_reading(&mut self, window: AcquisitionWindow, now_ms: u64) -> Option<Sample>;
}

// ───────────────────────────────────────────────────────────────
// Telemetry port (backend client)
// ───────────────────────────────────────────────────────────────

/// Identity of the backend as reported by its health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub status: String,
}

pub trait TelemetryPort {
    /// Check that the endpoint is reachable and healthy.
    fn validate(&mut self) -> Result<ServerInfo, TelemetryError>;

    /// Serialise and transmit one point.  Never retried by the caller.
    fn publish(&mut self, point: &DataPoint) -> Result<(), TelemetryError>;

    fn server_url(&self) -> &str;

    /// Human-readable detail of the last failure, if the server sent one.
    fn last_error_message(&self) -> Option<&str>;
}

// ───────────────────────────────────────────────────────────────
// Fault indicator (driven adapter: domain → LED)
// ───────────────────────────────────────────────────────────────

pub trait FaultIndicator {
    /// Latch the visible fault signal on.  Never released.
    fn hold_fault(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
