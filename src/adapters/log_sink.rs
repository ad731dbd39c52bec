//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC in production, stderr on the host).  Each
//! line starts with a short tag so the console can be grepped by stage.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::LinkWaiting {
                attempt,
                retry_in_ms,
            } => {
                info!("LINK  | attempt {} failed, retry in {} ms", attempt, retry_in_ms);
            }
            AppEvent::LinkUp { rssi } => match rssi {
                Some(r) => info!("LINK  | connected, RSSI {} dBm", r),
                None => info!("LINK  | connected"),
            },
            AppEvent::TimeSynced { wall_clock_valid } => {
                if *wall_clock_valid {
                    info!("TIME  | synchronised");
                } else {
                    warn!("TIME  | wall clock not set, points go out unstamped");
                }
            }
            AppEvent::BackendReady { url, info } => {
                info!(
                    "INFLUX| connected to {} ({} {}, {})",
                    url, info.name, info.version, info.status
                );
            }
            AppEvent::BackendUnavailable {
                url,
                error,
                message,
            } => {
                warn!(
                    "INFLUX| connection to {} failed: {}{}{}",
                    url,
                    error,
                    if message.is_some() { ": " } else { "" },
                    message.as_deref().unwrap_or("")
                );
            }
            AppEvent::SensorConfigured { variant } => {
                info!("SENSOR| {} configured", variant);
            }
            AppEvent::Halted(e) => {
                error!("HALT  | {}", e);
            }
            AppEvent::ReadFailed(phase) => {
                warn!("SENSOR| {:?} of reading failed, cycle skipped", phase);
            }
            AppEvent::Writing(line) => {
                info!("WRITE | {}", line);
            }
            AppEvent::LinkLost => {
                warn!("LINK  | connection lost");
            }
            AppEvent::Published => {
                info!("INFLUX| write ok");
            }
            AppEvent::PublishFailed { error, message } => {
                warn!(
                    "INFLUX| write failed: {}{}{}",
                    error,
                    if message.is_some() { ": " } else { "" },
                    message.as_deref().unwrap_or("")
                );
            }
            AppEvent::Waiting { ms } => {
                info!("WAIT  | {} ms", ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ServerInfo;
    use crate::error::{Error, SensorError, TelemetryError};
    use crate::sensors::{AcquisitionPhase, SensorVariant};

    #[test]
    fn renders_every_event() {
        let mut sink = LogEventSink::new();
        let events = [
            AppEvent::LinkWaiting { attempt: 1, retry_in_ms: 100 },
            AppEvent::LinkUp { rssi: Some(-61) },
            AppEvent::LinkUp { rssi: None },
            AppEvent::TimeSynced { wall_clock_valid: false },
            AppEvent::BackendReady {
                url: "https://influx.test".into(),
                info: ServerInfo::default(),
            },
            AppEvent::BackendUnavailable {
                url: "https://influx.test".into(),
                error: TelemetryError::Unauthorized,
                message: Some("unauthorized access".into()),
            },
            AppEvent::SensorConfigured { variant: SensorVariant::Bme680 },
            AppEvent::Halted(Error::Sensor(SensorError::NotDetected)),
            AppEvent::ReadFailed(AcquisitionPhase::End),
            AppEvent::Writing("BME280,device=ESP32 temperature=21.00".into()),
            AppEvent::LinkLost,
            AppEvent::Published,
            AppEvent::PublishFailed { error: TelemetryError::Io, message: None },
            AppEvent::Waiting { ms: 1_000 },
        ];
        for e in &events {
            sink.emit(e);
        }
    }
}
