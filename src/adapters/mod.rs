//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements      | Connects to                    |
//! |------------------|-----------------|--------------------------------|
//! | `wifi`           | LinkPort        | ESP-IDF WiFi STA               |
//! | `sntp`           | TimeSyncPort    | ESP-IDF SNTP + POSIX TZ        |
//! | `time`           | ClockPort       | esp_timer / gettimeofday       |
//! |                  | DelayNs         | async-io-mini timer reactor    |
//! | `influx`         | TelemetryPort   | InfluxDB v2 HTTP API           |
//! | `http_transport` | HttpTransport   | esp_http_client + mbedTLS      |
//! | `cert_store`     | —               | PEM root CA for mbedTLS        |
//! | `log_sink`       | EventSink       | Serial log output              |

pub mod cert_store;
pub mod http_transport;
pub mod influx;
pub mod log_sink;
pub mod sntp;
pub mod time;
pub(super) mod utils;
pub mod wifi;
