//! EnvNode Firmware: Main Entry Point
//!
//! Wires the ESP-IDF adapters into the hexagonal core and runs it.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter     SntpTimeSync   SystemClock    ReactorDelay    │
//! │  (Link)          (TimeSync)     (Clock)        (DelayNs)       │
//! │  Bme280/680      InfluxClient   StatusLed      LogEventSink    │
//! │  (Sensor)        (Telemetry)    (Fault)        (EventSink)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  boot · sample → build → link → publish → sleep        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use log::{error, info, warn};

use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use envnode::adapters::cert_store::RootCertificate;
use envnode::adapters::http_transport::EspHttpTransport;
use envnode::adapters::influx::InfluxClient;
use envnode::adapters::log_sink::LogEventSink;
use envnode::adapters::sntp::SntpTimeSync;
use envnode::adapters::time::{ReactorDelay, SystemClock};
use envnode::adapters::wifi::WifiAdapter;
use envnode::app::ports::{EnvironmentalSensor, FaultIndicator, LinkPort, TelemetryPort};
use envnode::app::service::NodeService;
use envnode::config::NodeConfig;
use envnode::drivers::status_led::StatusLed;
use envnode::pins;
use envnode::sensors::SensorVariant;
use envnode::sensors::bme280::Bme280Adapter;
use envnode::sensors::bme680::Bme680Adapter;
use envnode::sensors::esp_bme280::EspBme280Chip;
use envnode::sensors::esp_bme680::EspBme680Chip;

/// Park the main task forever.  The LED state is left as is.
fn halt() -> ! {
    loop {
        std::thread::sleep(core::time::Duration::from_secs(60));
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  EnvNode v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;

    // SAFETY: pin numbers come from `pins`, each claimed exactly once here.
    let led_pin = unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) };
    let mut led = StatusLed::new(PinDriver::output(led_pin)?);

    // ── 2. Configuration ──────────────────────────────────────
    let config = NodeConfig::from_build_env();
    if let Err(e) = config.validate() {
        error!("Config invalid: {}, halting", e);
        led.hold_fault();
        halt();
    }

    // ── 3. Sensor bus ─────────────────────────────────────────
    // SAFETY: as above.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
        )
    };
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_BAUDRATE_HZ));
    let i2c = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config)?;

    // ── 4. WiFi ───────────────────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;
    let link = WifiAdapter::new(wifi, &config.wifi).map_err(|e| anyhow!("WiFi: {e}"))?;

    // ── 5. Backend client ─────────────────────────────────────
    let root_ca = match config.backend.root_ca_pem.as_deref().map(RootCertificate::from_pem) {
        Some(Ok(cert)) => Some(cert.leak()),
        Some(Err(e)) => {
            warn!("Root CA rejected ({}), falling back to the certificate bundle", e);
            None
        }
        None => None,
    };
    let telemetry = InfluxClient::new(EspHttpTransport::new(root_ca), &config.backend);

    // ── 6. Run ────────────────────────────────────────────────
    let address = config.sensor.i2c_address;
    let sea_level = config.sea_level_hpa;
    match config.variant() {
        SensorVariant::Bme280 => {
            let sensor = Bme280Adapter::new(EspBme280Chip::new(i2c, address), sea_level);
            run(NodeService::new(config, sensor, link, telemetry, SystemClock::new(), ReactorDelay), led)
        }
        SensorVariant::Bme680 => {
            let sensor = Bme680Adapter::new(EspBme680Chip::new(i2c, address), sea_level);
            run(NodeService::new(config, sensor, link, telemetry, SystemClock::new(), ReactorDelay), led)
        }
    }
}

/// Boot the node and cycle forever.  Returns only through `halt`.
fn run<S, L, T>(
    mut node: NodeService<S, L, T, SystemClock, ReactorDelay>,
    mut led: impl FaultIndicator,
) -> !
where
    S: EnvironmentalSensor,
    L: LinkPort,
    T: TelemetryPort,
{
    let mut sntp = SntpTimeSync::new();
    let mut sink = LogEventSink::new();

    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    let stopped = futures_lite::future::block_on(executor.run(async {
        node.boot(&mut sntp, &mut led, &mut sink).await?;
        Err::<(), _>(node.run(&mut sink).await)
    }));

    // Only reached when boot failed; the fault LED is already held.
    if let Err(e) = stopped {
        error!("Node stopped: {}", e);
    }
    halt()
}
