//! Clock and delay adapters.
//!
//! - [`SystemClock`] implements [`ClockPort`]: monotonic uptime plus the
//!   wall clock once SNTP has set it.
//! - [`ReactorDelay`] implements `embedded_hal_async::delay::DelayNs` on
//!   `async_io_mini::Timer`, so the control loop's waits yield to the
//!   executor instead of spinning.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` and
//!   `gettimeofday()`.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `SystemTime` for host-side runs.

use core::time::Duration;

use embedded_hal_async::delay::DelayNs;

use crate::app::ports::ClockPort;

/// 2020-01-01T00:00:00Z.  Anything earlier means SNTP has not run yet.
const EPOCH_2020_SECS: i64 = 1_577_836_800;

/// Wall-clock nanoseconds if the clock is plausible.
fn plausible(secs: i64, subsec_nanos: i64) -> Option<i64> {
    (secs >= EPOCH_2020_SECS).then(|| secs * 1_000_000_000 + subsec_nanos)
}

// ───────────────────────────────────────────────────────────────
// SystemClock
// ───────────────────────────────────────────────────────────────

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl ClockPort for SystemClock {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        // SAFETY: reads the free-running high-resolution timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn unix_nanos(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: `tv` is a valid out-pointer; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        plausible(tv.tv_sec as i64, i64::from(tv.tv_usec) * 1_000)
    }

    #[cfg(not(target_os = "espidf"))]
    fn unix_nanos(&self) -> Option<i64> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?;
        plausible(now.as_secs() as i64, i64::from(now.subsec_nanos()))
    }
}

// ───────────────────────────────────────────────────────────────
// ReactorDelay
// ───────────────────────────────────────────────────────────────

/// Async delay backed by the `async-io-mini` timer reactor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactorDelay;

impl DelayNs for ReactorDelay {
    async fn delay_ns(&mut self, ns: u32) {
        async_io_mini::Timer::after(Duration::from_nanos(u64::from(ns))).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        async_io_mini::Timer::after(Duration::from_millis(u64::from(ms))).await;
    }
}
