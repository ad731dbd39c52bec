//! Node configuration parameters
//!
//! All tunable parameters for the sensor node.  Defaults reproduce the
//! stock behaviour; secrets are overlaid from the build environment and a
//! JSON document can replace the whole set at provisioning time.

use serde::{Deserialize, Serialize};

use crate::adapters::utils::{http_url_ok, label_ok, passphrase_ok, ssid_ok};
use crate::error::ConfigError;
use crate::point::WritePrecision;
use crate::sensors::{SensorParams, SensorVariant};

pub const MAX_WIFI_CANDIDATES: usize = 4;
pub const MAX_NTP_SERVERS: usize = 3;
pub const MAX_EXTRA_TAGS: usize = 3;

/// One access point the node may associate with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCandidate {
    pub ssid: heapless::String<32>,
    /// Empty for open networks.
    pub password: heapless::String<64>,
}

/// Time-series backend addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://eu-central-1-1.aws.cloud2.influxdata.com`.
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    /// PEM root certificate; `None` uses the built-in CA bundle.
    pub root_ca_pem: Option<String>,
    /// `None` omits the timestamp and lets the server stamp the point.
    pub write_precision: Option<WritePrecision>,
}

/// How long boot waits for the first association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRetryPolicy {
    /// Delay after the first failed attempt (ms).
    pub initial_delay_ms: u32,
    /// Delay doubles after each failure up to this cap (ms).
    pub max_delay_ms: u32,
    /// `None` waits forever.
    pub max_attempts: Option<u32>,
}

impl LinkRetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> u32 {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay_ms
            .saturating_mul(1 << shift)
            .min(self.max_delay_ms)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl Default for LinkRetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 100,
            max_attempts: None,
        }
    }
}

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Connectivity ---
    pub wifi: heapless::Vec<WifiCandidate, MAX_WIFI_CANDIDATES>,
    pub link_retry: LinkRetryPolicy,

    // --- Backend ---
    pub backend: BackendConfig,

    // --- Time ---
    /// POSIX TZ string.
    pub timezone: String,
    pub ntp_servers: heapless::Vec<heapless::String<64>, MAX_NTP_SERVERS>,

    // --- Sensor ---
    pub sensor: SensorParams,
    /// Sea-level pressure reference for altitude (hPa).
    pub sea_level_hpa: f32,

    // --- Point ---
    /// Overrides the measurement name (defaults to the sensor model).
    pub measurement: Option<String>,
    /// Value of the `device` tag.
    pub device_tag: String,
    pub extra_tags: heapless::Vec<(String, String), MAX_EXTRA_TAGS>,

    // --- Timing ---
    /// Sample-and-publish period (milliseconds)
    pub cycle_period_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let mut ntp_servers = heapless::Vec::new();
        for s in ["pool.ntp.org", "time.nis.gov"] {
            // Capacity 3 holds both defaults.
            let _ = ntp_servers.push(heapless::String::try_from(s).unwrap_or_default());
        }

        Self {
            wifi: heapless::Vec::new(),
            link_retry: LinkRetryPolicy::default(),

            backend: BackendConfig {
                url: String::new(),
                org: String::new(),
                bucket: String::new(),
                token: String::new(),
                root_ca_pem: None,
                write_precision: Some(WritePrecision::Seconds),
            },

            timezone: "UTC1".into(),
            ntp_servers,

            sensor: SensorParams::bme280(),
            sea_level_hpa: 1013.25,

            measurement: None,
            device_tag: "ESP32".into(),
            extra_tags: heapless::Vec::new(),

            cycle_period_ms: 1000, // 1 Hz
        }
    }
}

impl NodeConfig {
    /// Defaults overlaid with secrets baked in at build time
    /// (`WIFI_SSID`, `WIFI_PASSWORD`, `INFLUXDB_*`).
    pub fn from_build_env() -> Self {
        let mut c = Self::default();
        if let Some(ssid) = option_env!("WIFI_SSID") {
            let candidate = WifiCandidate {
                ssid: heapless::String::try_from(ssid).unwrap_or_default(),
                password: heapless::String::try_from(option_env!("WIFI_PASSWORD").unwrap_or(""))
                    .unwrap_or_default(),
            };
            let _ = c.wifi.push(candidate);
        }
        let b = &mut c.backend;
        for (slot, value) in [
            (&mut b.url, option_env!("INFLUXDB_URL")),
            (&mut b.org, option_env!("INFLUXDB_ORG")),
            (&mut b.bucket, option_env!("INFLUXDB_BUCKET")),
            (&mut b.token, option_env!("INFLUXDB_TOKEN")),
        ] {
            if let Some(v) = value {
                *slot = v.to_owned();
            }
        }
        c
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let c: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Malformed)?;
        c.validate()?;
        Ok(c)
    }

    /// Measurement name on the wire.
    pub fn measurement_name(&self) -> &str {
        self.measurement
            .as_deref()
            .unwrap_or(self.sensor.variant.name())
    }

    pub fn variant(&self) -> SensorVariant {
        self.sensor.variant
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::ValidationFailed as Invalid;

        if self.wifi.is_empty() {
            return Err(Invalid("wifi: at least one access point required"));
        }
        for c in &self.wifi {
            if !ssid_ok(&c.ssid) {
                return Err(Invalid("wifi.ssid: 1-32 printable ASCII bytes"));
            }
            if !passphrase_ok(&c.password) {
                return Err(Invalid("wifi.password: empty or 8-64 bytes"));
            }
        }

        if !http_url_ok(&self.backend.url) {
            return Err(Invalid("backend.url: http:// or https:// followed by a host"));
        }
        if self.backend.org.is_empty() || self.backend.bucket.is_empty() {
            return Err(Invalid("backend: org and bucket required"));
        }
        if self.backend.token.is_empty() {
            return Err(Invalid("backend.token: required"));
        }

        if self.ntp_servers.is_empty() || self.ntp_servers.iter().any(|s| s.is_empty()) {
            return Err(Invalid("ntp_servers: at least one non-empty host"));
        }
        if self.timezone.is_empty() {
            return Err(Invalid("timezone: required"));
        }

        if !(800.0..=1100.0).contains(&self.sea_level_hpa) {
            return Err(Invalid("sea_level_hpa: 800-1100"));
        }
        if !matches!(self.sensor.i2c_address, 0x76 | 0x77) {
            return Err(Invalid("sensor.i2c_address: 0x76 or 0x77"));
        }
        if !self.sensor.variant.supports_filter(self.sensor.filter_coefficient) {
            return Err(Invalid("sensor.filter_coefficient: not supported by model"));
        }
        if self.sensor.variant == SensorVariant::Bme280 && self.sensor.gas_heater.is_some() {
            return Err(Invalid("sensor.gas_heater: BME680 only"));
        }

        if !label_ok(&self.device_tag, 64) {
            return Err(Invalid("device_tag: 1-64 bytes, no control characters"));
        }
        for (k, v) in &self.extra_tags {
            if !label_ok(k, 32) || !label_ok(v, 64) {
                return Err(Invalid(
                    "extra_tags: key 1-32 bytes, value 1-64 bytes, no control characters",
                ));
            }
            if k == "device" {
                return Err(Invalid("extra_tags: 'device' is reserved"));
            }
        }
        if self.measurement.as_deref().is_some_and(|m| !label_ok(m, 64)) {
            return Err(Invalid("measurement: 1-64 bytes, no control characters"));
        }
        if self.cycle_period_ms == 0 {
            return Err(Invalid("cycle_period_ms: must be > 0"));
        }
        let p = &self.link_retry;
        if p.initial_delay_ms == 0 || p.max_delay_ms < p.initial_delay_ms {
            return Err(Invalid("link_retry: 0 < initial_delay_ms <= max_delay_ms"));
        }
        if p.max_attempts == Some(0) {
            return Err(Invalid("link_retry.max_attempts: must be > 0"));
        }
        Ok(())
    }
}
