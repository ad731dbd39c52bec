//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them; the stock one writes them to the
//! serial console.

use crate::error::{Error, TelemetryError};
use crate::sensors::{AcquisitionPhase, SensorVariant};

use super::ports::ServerInfo;

/// Structured events emitted by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // ── Boot ──────────────────────────────────────────────────
    /// Association attempt `attempt` failed; retrying after `retry_in_ms`.
    LinkWaiting { attempt: u32, retry_in_ms: u32 },

    /// Link is up.
    LinkUp { rssi: Option<i8> },

    /// SNTP requested.  `wall_clock_valid` tells whether the clock is now
    /// plausible.
    TimeSynced { wall_clock_valid: bool },

    /// Backend health check passed.
    BackendReady { url: String, info: ServerInfo },

    /// Backend health check failed (boot continues).
    BackendUnavailable {
        url: String,
        error: TelemetryError,
        message: Option<String>,
    },

    /// Sensor configured; steady state begins.
    SensorConfigured { variant: SensorVariant },

    /// Boot aborted; the node is halted with the fault indicator on.
    Halted(Error),

    // ── Steady state ──────────────────────────────────────────
    /// One acquisition phase failed; the cycle is skipped.
    ReadFailed(AcquisitionPhase),

    /// Wire representation of the point about to be published.
    Writing(String),

    /// `ensure_connected` reported `Disconnected`.
    LinkLost,

    /// Point accepted by the backend.
    Published,

    /// Publish failed; the point is dropped.
    PublishFailed {
        error: TelemetryError,
        message: Option<String>,
    },

    /// Sleeping until the next cycle.
    Waiting { ms: u32 },
}
