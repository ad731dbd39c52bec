//! Host harness for driving a full `NodeService` without hardware.
//!
//! The sensor, link and backend are the real adapters in their simulation
//! builds; only time is faked.  [`VirtualClock`] is both the `ClockPort`
//! and the `DelayNs`, so every await advances the same counter and tests
//! can assert exact cycle timing.

use core::cell::Cell;
use std::rc::Rc;

use embedded_hal_async::delay::DelayNs;

use envnode::adapters::http_transport::SimHttpTransport;
use envnode::adapters::influx::InfluxClient;
use envnode::adapters::sntp::SntpTimeSync;
use envnode::adapters::wifi::WifiAdapter;
use envnode::app::events::AppEvent;
use envnode::app::ports::{ClockPort, EventSink};
use envnode::app::service::NodeService;
use envnode::config::{NodeConfig, WifiCandidate};
use envnode::drivers::status_led::StatusLed;
use envnode::error::Error;
use envnode::point::WritePrecision;
use envnode::sensors::RawMeasurement;
use envnode::sensors::bme280::Bme280Adapter;
use envnode::sensors::bme680::Bme680Adapter;
use envnode::sensors::sim::SimChip;

// ── Virtual time ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct VirtualClock {
    now_ms: Rc<Cell<u64>>,
    wall_nanos: Rc<Cell<Option<i64>>>,
}

#[allow(dead_code)]
impl VirtualClock {
    pub fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    /// Pretend SNTP has set the wall clock to `nanos` since the epoch.
    pub fn set_wall_nanos(&self, nanos: i64) {
        self.wall_nanos.set(Some(nanos));
    }
}

impl ClockPort for VirtualClock {
    fn uptime_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn unix_nanos(&self) -> Option<i64> {
        self.wall_nanos.get()
    }
}

impl DelayNs for VirtualClock {
    async fn delay_ns(&mut self, ns: u32) {
        self.now_ms
            .set(self.now_ms.get() + u64::from(ns).div_ceil(1_000_000));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.now_ms.set(self.now_ms.get() + u64::from(ms));
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Node assembly ─────────────────────────────────────────────

pub type Backend = InfluxClient<SimHttpTransport>;
pub type Bme280Node = NodeService<Bme280Adapter<SimChip>, WifiAdapter, Backend, VirtualClock, VirtualClock>;
pub type Bme680Node = NodeService<Bme680Adapter<SimChip>, WifiAdapter, Backend, VirtualClock, VirtualClock>;

pub fn candidate(ssid: &str) -> WifiCandidate {
    WifiCandidate {
        ssid: ssid.try_into().unwrap(),
        password: "hunter22".try_into().unwrap(),
    }
}

/// A configuration that passes `validate()`.
pub fn config() -> NodeConfig {
    let mut c = NodeConfig::default();
    c.wifi.push(candidate("lab-2g")).unwrap();
    c.wifi.push(candidate("lab-guest")).unwrap();
    c.backend.url = "https://influx.test".into();
    c.backend.org = "lab".into();
    c.backend.bucket = "env".into();
    c.backend.token = "t0k3n".into();
    c
}

/// 22.5 °C, 1013.25 hPa, 45 %RH.
pub fn reading() -> RawMeasurement {
    RawMeasurement {
        temperature_c: 22.5,
        pressure_pa: 101_325.0,
        humidity_pct: Some(45.0),
        gas_ohms: None,
    }
}

pub fn bme280_node(config: NodeConfig, chip: SimChip) -> (Bme280Node, VirtualClock) {
    let clock = VirtualClock::default();
    let link = WifiAdapter::new(&config.wifi).unwrap();
    let backend = InfluxClient::new(SimHttpTransport::new(), &config.backend);
    let sensor = Bme280Adapter::new(chip, config.sea_level_hpa);
    let node = NodeService::new(config, sensor, link, backend, clock.clone(), clock.clone());
    (node, clock)
}

pub fn bme680_node(config: NodeConfig, chip: SimChip) -> (Bme680Node, VirtualClock) {
    let clock = VirtualClock::default();
    let link = WifiAdapter::new(&config.wifi).unwrap();
    let backend = InfluxClient::new(SimHttpTransport::new(), &config.backend);
    let sensor = Bme680Adapter::new(chip, config.sea_level_hpa);
    let node = NodeService::new(config, sensor, link, backend, clock.clone(), clock.clone());
    (node, clock)
}

/// Boot with the host SNTP and LED stand-ins.
#[allow(dead_code)]
pub fn boot_280(node: &mut Bme280Node, sink: &mut RecordingSink) -> (Result<(), Error>, StatusLed) {
    let mut led = StatusLed::new();
    let mut sntp = SntpTimeSync::new();
    let r = futures_lite::future::block_on(node.boot(&mut sntp, &mut led, sink));
    (r, led)
}

#[allow(dead_code)]
pub fn boot_680(node: &mut Bme680Node, sink: &mut RecordingSink) -> (Result<(), Error>, StatusLed) {
    let mut led = StatusLed::new();
    let mut sntp = SntpTimeSync::new();
    let r = futures_lite::future::block_on(node.boot(&mut sntp, &mut led, sink));
    (r, led)
}

#[allow(dead_code)]
pub fn with_precision(mut c: NodeConfig, p: Option<WritePrecision>) -> NodeConfig {
    c.backend.write_precision = p;
    c
}
