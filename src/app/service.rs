//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the configuration, the single reusable
//! [`DataPoint`] and every steady-state collaborator.  It sequences the
//! boot (link → time → backend check → tags → sensor) once, then repeats
//! the sample → build → check link → publish → sleep cycle forever.
//!
//! ```text
//!  EnvironmentalSensor ──▶ ┌────────────────────────┐ ──▶ TelemetryPort
//!             LinkPort ──▶ │      NodeService       │ ──▶ EventSink
//!            ClockPort ──▶ │  boot · cycle · sleep  │ ──▶ FaultIndicator
//!                          └────────────────────────┘
//! ```
//!
//! All suspension points (boot link wait, conversion window, cycle sleep)
//! are awaited on the injected [`DelayNs`], so the whole loop runs against
//! a virtual clock in tests.

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::config::{MAX_NTP_SERVERS, NodeConfig};
use crate::error::{ConfigError, Error, LinkError, SensorError, TelemetryError};
use crate::point::{DataPoint, FieldValue};
use crate::sensors::{AcquisitionPhase, Sample};

use super::events::AppEvent;
use super::ports::{
    ClockPort, EnvironmentalSensor, EventSink, FaultIndicator, LinkPort, TelemetryPort,
    TimeSyncPort,
};

/// Tag key carrying the device class.
pub const DEVICE_TAG: &str = "device";

// ───────────────────────────────────────────────────────────────
// State and outcomes
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    SteadyState,
    /// Boot hit a fatal condition; the fault indicator is held.
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BeginFailed,
    EndFailed,
    NotBooted,
}

/// Result of one steady-state cycle.  Nothing inside a cycle escapes as
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    PublishFailed(TelemetryError),
    Skipped(SkipReason),
}

/// Running counters since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleStats {
    pub cycles: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub skipped_reads: u64,
    pub link_losses: u64,
}

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService<S, L, T, K, D> {
    config: NodeConfig,
    sensor: S,
    link: L,
    telemetry: T,
    clock: K,
    delay: D,
    point: DataPoint,
    state: NodeState,
    stats: CycleStats,
}

impl<S, L, T, K, D> NodeService<S, L, T, K, D>
where
    S: EnvironmentalSensor,
    L: LinkPort,
    T: TelemetryPort,
    K: ClockPort,
    D: DelayNs,
{
    /// Wire the service.  Nothing is touched until [`boot`](Self::boot).
    pub fn new(config: NodeConfig, sensor: S, link: L, telemetry: T, clock: K, delay: D) -> Self {
        let point = DataPoint::new(config.measurement_name());
        Self {
            config,
            sensor,
            link,
            telemetry,
            clock,
            delay,
            point,
            state: NodeState::Booting,
            stats: CycleStats::default(),
        }
    }

    // ── Boot ──────────────────────────────────────────────────

    /// Run the boot sequence once.
    ///
    /// Only an absent sensor, an unusable tag set, or an exhausted finite
    /// link retry cap are fatal: the fault indicator is latched, the node
    /// moves to [`NodeState::Halted`] and the error is returned.  A failed
    /// backend check is reported and boot continues.
    pub async fn boot(
        &mut self,
        time: &mut impl TimeSyncPort,
        fault: &mut impl FaultIndicator,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        if self.state != NodeState::Booting {
            return Err(Error::AlreadyBooted);
        }

        // 1. Link up (blocks under the retry policy)
        if let Err(e) = self.wait_for_link(sink).await {
            return Err(self.halt(e, fault, sink));
        }

        // 2. Wall clock, needed before any certificate check
        {
            let servers: heapless::Vec<&str, MAX_NTP_SERVERS> =
                self.config.ntp_servers.iter().map(|s| s.as_str()).collect();
            time.sync_time(&self.config.timezone, &servers);
        }
        sink.emit(&AppEvent::TimeSynced {
            wall_clock_valid: self.clock.unix_nanos().is_some(),
        });

        // 3. Backend check, best effort
        let url = self.telemetry.server_url().to_owned();
        match self.telemetry.validate() {
            Ok(info) => sink.emit(&AppEvent::BackendReady { url, info }),
            Err(error) => sink.emit(&AppEvent::BackendUnavailable {
                url,
                error,
                message: self.telemetry.last_error_message().map(String::from),
            }),
        }

        // 4. Fixed tags, never touched again
        if let Err(e) = self.set_tags() {
            return Err(self.halt(e, fault, sink));
        }

        // 5. Sensor
        if !self.sensor.configure(&self.config.sensor) {
            return Err(self.halt(SensorError::NotDetected.into(), fault, sink));
        }
        sink.emit(&AppEvent::SensorConfigured {
            variant: self.sensor.variant(),
        });

        self.state = NodeState::SteadyState;
        info!(
            "Node up: {} every {} ms",
            self.point.measurement(),
            self.config.cycle_period_ms
        );
        Ok(())
    }

    async fn wait_for_link(&mut self, sink: &mut impl EventSink) -> Result<(), Error> {
        let policy = self.config.link_retry;
        let mut attempts: u32 = 0;
        while !self.link.ensure_connected().is_connected() {
            attempts = attempts.saturating_add(1);
            if policy.exhausted(attempts) {
                return Err(LinkError::GaveUp { attempts }.into());
            }
            let retry_in_ms = policy.delay_after(attempts);
            sink.emit(&AppEvent::LinkWaiting {
                attempt: attempts,
                retry_in_ms,
            });
            self.delay.delay_ms(retry_in_ms).await;
        }
        sink.emit(&AppEvent::LinkUp {
            rssi: self.link.rssi(),
        });
        Ok(())
    }

    fn set_tags(&mut self) -> Result<(), Error> {
        let invalid = |_| Error::Config(ConfigError::ValidationFailed("tags: too many or too long"));
        self.point
            .add_tag(DEVICE_TAG, &self.config.device_tag)
            .map_err(invalid)?;
        for (k, v) in &self.config.extra_tags {
            self.point.add_tag(k, v).map_err(invalid)?;
        }
        Ok(())
    }

    fn halt(
        &mut self,
        err: Error,
        fault: &mut impl FaultIndicator,
        sink: &mut impl EventSink,
    ) -> Error {
        error!("Boot failed: {}; halting", err);
        fault.hold_fault();
        self.state = NodeState::Halted;
        sink.emit(&AppEvent::Halted(err));
        err
    }

    // ── Steady state ──────────────────────────────────────────

    /// Run one cycle, trailing sleep included.  Skipped and failed cycles
    /// sleep the full period too.
    pub async fn run_cycle(&mut self, sink: &mut impl EventSink) -> CycleOutcome {
        if self.state != NodeState::SteadyState {
            return CycleOutcome::Skipped(SkipReason::NotBooted);
        }
        self.stats.cycles += 1;

        let outcome = self.sample_and_publish(sink).await;

        let period = self.config.cycle_period_ms;
        sink.emit(&AppEvent::Waiting { ms: period });
        self.delay.delay_ms(period).await;
        outcome
    }

    /// Cycle forever.  Returns only if the node never finished booting.
    pub async fn run(&mut self, sink: &mut impl EventSink) -> Error {
        if self.state != NodeState::SteadyState {
            return Error::NotBooted;
        }
        loop {
            self.run_cycle(sink).await;
        }
    }

    async fn sample_and_publish(&mut self, sink: &mut impl EventSink) -> CycleOutcome {
        self.point.clear_fields();

        let sample = match self.acquire(sink).await {
            Ok(sample) => sample,
            Err(reason) => {
                self.stats.skipped_reads += 1;
                return CycleOutcome::Skipped(reason);
            }
        };

        self.populate(&sample);
        sink.emit(&AppEvent::Writing(self.point.to_line_protocol()));

        if !self.link.ensure_connected().is_connected() {
            self.stats.link_losses += 1;
            sink.emit(&AppEvent::LinkLost);
        }

        match self.telemetry.publish(&self.point) {
            Ok(()) => {
                self.stats.published += 1;
                sink.emit(&AppEvent::Published);
                CycleOutcome::Published
            }
            Err(error) => {
                self.stats.publish_failures += 1;
                sink.emit(&AppEvent::PublishFailed {
                    error,
                    message: self.telemetry.last_error_message().map(String::from),
                });
                CycleOutcome::PublishFailed(error)
            }
        }
    }

    /// Two-phase acquisition: start, await the conversion window, collect.
    async fn acquire(&mut self, sink: &mut impl EventSink) -> Result<Sample, SkipReason> {
        let Some(window) = self.sensor.begin_reading(self.clock.uptime_ms()) else {
            warn!("Sensor could not start a reading, skipping cycle");
            sink.emit(&AppEvent::ReadFailed(AcquisitionPhase::Begin));
            return Err(SkipReason::BeginFailed);
        };

        let wait = window.remaining_ms(self.clock.uptime_ms());
        if wait > 0 {
            self.delay.delay_ms(wait).await;
        }

        match self.sensor.end_reading(window, self.clock.uptime_ms()) {
            Some(sample) => Ok(sample),
            None => {
                warn!("Sensor reading failed, skipping cycle");
                sink.emit(&AppEvent::ReadFailed(AcquisitionPhase::End));
                Err(SkipReason::EndFailed)
            }
        }
    }

    /// Fill the point from `sample`: one float field per supported quantity
    /// present, plus the capture timestamp when the wall clock is valid.
    fn populate(&mut self, sample: &Sample) {
        for q in self.sensor.capabilities().iter() {
            if let Some(v) = sample.get(q) {
                if let Err(e) = self.point.add_field(q.field_key(), FieldValue::float(v)) {
                    warn!("Dropping field {}: {}", q.field_key(), e);
                }
            }
        }
        if let (Some(precision), Some(nanos)) =
            (self.config.backend.write_precision, self.clock.unix_nanos())
        {
            self.point.set_timestamp(Some(precision.scale_nanos(nanos)));
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// The reusable point as last populated.
    pub fn point(&self) -> &DataPoint {
        &self.point
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }
}
