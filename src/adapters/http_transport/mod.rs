//! HTTP(S) request transport for the telemetry client.
//!
//! [`HttpTransport`] is the narrow TLS/HTTP collaborator behind
//! [`InfluxClient`](super::influx::InfluxClient): one blocking request in,
//! status and body out.  Everything protocol-specific (paths, headers,
//! status interpretation) stays in the client.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`EspHttpTransport`] over
//!   `esp_idf_svc::http::client::EspHttpConnection` with mbedTLS, using the
//!   configured root CA or the built-in certificate bundle.
//! - **all other targets**: [`SimHttpTransport`], a scripted in-memory
//!   backend that records every request for inspection.

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

#[cfg(not(target_os = "espidf"))]
use log::info;

use crate::error::TelemetryError;

// ───────────────────────────────────────────────────────────────
// Request / response types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Largest response body kept; the rest is discarded unread.
pub const MAX_BODY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Body text, truncated to [`MAX_BODY`] bytes.
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
        }
    }
}

pub trait HttpTransport {
    /// Perform one request.  Transport-level failures (DNS, TCP, TLS,
    /// timeout) are errors; any HTTP status is a successful response.
    fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TelemetryError>;
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation (real mbedTLS HTTP client)
// ───────────────────────────────────────────────────────────────
#[cfg(target_os = "espidf")]
mod esp_impl;

#[cfg(target_os = "espidf")]
pub use esp_impl::EspHttpTransport;

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Health body returned when nothing is scripted.
#[cfg(not(target_os = "espidf"))]
pub const SIM_HEALTH_BODY: &str = r#"{"name":"influxdb","message":"ready for queries and writes","status":"pass","checks":[],"version":"v2.7.4","commit":"19e5c0e1b7"}"#;

/// One request as seen by [`SimHttpTransport`].
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[cfg(not(target_os = "espidf"))]
impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted backend.  Queued results are consumed in order; with an
/// empty queue GET answers a passing health check and POST answers 204.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimHttpTransport {
    script: VecDeque<Result<HttpResponse, TelemetryError>>,
    requests: Vec<RecordedRequest>,
}

#[cfg(not(target_os = "espidf"))]
impl SimHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&mut self, status: u16, body: &str) {
        self.script.push_back(Ok(HttpResponse::new(status, body)));
    }

    pub fn push_error(&mut self, error: TelemetryError) {
        self.script.push_back(Err(error));
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    /// Bodies of every POST so far.
    pub fn posted_lines(&self) -> Vec<&str> {
        self.requests
            .iter()
            .filter(|r| r.method == Method::Post)
            .map(|r| r.body.as_str())
            .collect()
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpTransport for SimHttpTransport {
    fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TelemetryError> {
        info!("HTTP(sim): {:?} {} ({}B)", method, url, body.len());
        self.requests.push(RecordedRequest {
            method,
            url: url.to_owned(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        self.script.pop_front().unwrap_or_else(|| {
            Ok(match method {
                Method::Get => HttpResponse::new(200, SIM_HEALTH_BODY),
                Method::Post => HttpResponse::new(204, ""),
            })
        })
    }
}
