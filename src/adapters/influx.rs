//! InfluxDB v2 telemetry client.
//!
//! Implements [`TelemetryPort`] on top of any [`HttpTransport`]:
//!
//! | Operation  | Request                                              | Success |
//! |------------|------------------------------------------------------|---------|
//! | `validate` | `GET {url}/health`                                   | 200 + `"status":"pass"` |
//! | `publish`  | `POST {url}/api/v2/write?org=..&bucket=..&precision=..` | 204 |
//!
//! Writes carry `Authorization: Token <token>` and a line-protocol body.
//! Failed writes are reported, never retried, and never buffered.

use core::fmt::Write as _;

use log::{debug, info, warn};
use serde::Deserialize;

use super::http_transport::{HttpResponse, HttpTransport, Method};
use crate::app::ports::{ServerInfo, TelemetryPort};
use crate::config::BackendConfig;
use crate::error::TelemetryError;
use crate::point::DataPoint;

// ───────────────────────────────────────────────────────────────
// Response bodies
// ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HealthBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Parse a `/health` body.  Anything but `"status":"pass"` is unhealthy.
pub fn parse_health(body: &str) -> Result<ServerInfo, TelemetryError> {
    let h: HealthBody = serde_json::from_str(body).map_err(|_| TelemetryError::Unhealthy)?;
    if h.status != "pass" {
        return Err(TelemetryError::Unhealthy);
    }
    Ok(ServerInfo {
        name: h.name,
        version: h.version,
        status: h.status,
    })
}

/// Human-readable reason from an error response: the JSON `message`
/// when present, otherwise the raw body.
fn error_message(body: &str) -> Option<String> {
    if let Ok(e) = serde_json::from_str::<ErrorBody>(body) {
        return Some(e.message);
    }
    if let Ok(h) = serde_json::from_str::<HealthBody>(body) {
        return h.message;
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn status_error(status: u16) -> TelemetryError {
    match status {
        401 | 403 => TelemetryError::Unauthorized,
        _ => TelemetryError::Rejected { status },
    }
}

/// Percent-encode a query value (RFC 3986 unreserved set kept as-is).
pub fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────
// InfluxClient
// ───────────────────────────────────────────────────────────────

pub struct InfluxClient<H: HttpTransport> {
    http: H,
    base_url: String,
    health_url: String,
    write_url: String,
    auth: String,
    last_error: Option<String>,
    /// Reused line-protocol buffer.
    line: String,
}

impl<H: HttpTransport> InfluxClient<H> {
    pub fn new(http: H, backend: &BackendConfig) -> Self {
        let base_url = backend.url.trim_end_matches('/').to_owned();
        let mut write_url = format!(
            "{}/api/v2/write?org={}&bucket={}",
            base_url,
            encode_query_value(&backend.org),
            encode_query_value(&backend.bucket)
        );
        if let Some(p) = backend.write_precision {
            let _ = write!(write_url, "&precision={}", p.as_query());
        }
        Self {
            http,
            health_url: format!("{base_url}/health"),
            base_url,
            write_url,
            auth: format!("Token {}", backend.token),
            last_error: None,
            line: String::with_capacity(160),
        }
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }

    pub fn transport(&self) -> &H {
        &self.http
    }

    pub fn transport_mut(&mut self) -> &mut H {
        &mut self.http
    }

    fn fail(&mut self, error: TelemetryError, response: Option<&HttpResponse>) -> TelemetryError {
        self.last_error = match response {
            Some(r) => error_message(&r.body).or_else(|| Some(error.to_string())),
            None => Some(error.to_string()),
        };
        error
    }
}

impl<H: HttpTransport> TelemetryPort for InfluxClient<H> {
    fn validate(&mut self) -> Result<ServerInfo, TelemetryError> {
        info!("INFLUX: checking {}", self.health_url);
        let response = self
            .http
            .request(Method::Get, &self.health_url, &[("Accept", "application/json")], &[])
            .map_err(|e| self.fail(e, None))?;

        if matches!(response.status, 401 | 403) {
            return Err(self.fail(TelemetryError::Unauthorized, Some(&response)));
        }
        match parse_health(&response.body) {
            Ok(info) if response.status == 200 => {
                self.last_error = None;
                Ok(info)
            }
            Ok(_) => Err(self.fail(status_error(response.status), Some(&response))),
            Err(e) => {
                // 503 with a "fail" body is the usual unhealthy answer.
                let e = if response.status == 200 || response.status == 503 {
                    e
                } else {
                    status_error(response.status)
                };
                Err(self.fail(e, Some(&response)))
            }
        }
    }

    fn publish(&mut self, point: &DataPoint) -> Result<(), TelemetryError> {
        if !point.has_fields() {
            warn!("INFLUX: refusing to send a point with no fields");
            return Err(self.fail(TelemetryError::EmptyPoint, None));
        }

        self.line.clear();
        let _ = point.write_line_protocol(&mut self.line);
        let len = self.line.len().to_string();
        let headers = [
            ("Authorization", self.auth.as_str()),
            ("Content-Type", "text/plain; charset=utf-8"),
            ("Content-Length", len.as_str()),
            ("Accept", "application/json"),
        ];

        let result = self
            .http
            .request(Method::Post, &self.write_url, &headers, self.line.as_bytes());
        let response = result.map_err(|e| self.fail(e, None))?;

        match response.status {
            204 | 200 => {
                debug!("INFLUX: write accepted");
                self.last_error = None;
                Ok(())
            }
            status => Err(self.fail(status_error(status), Some(&response))),
        }
    }

    fn server_url(&self) -> &str {
        &self.base_url
    }

    fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http_transport::SimHttpTransport;
    use crate::point::{FieldValue, WritePrecision};

    fn backend() -> BackendConfig {
        BackendConfig {
            url: "https://influx.example.com/".into(),
            org: "Acme Labs".into(),
            bucket: "env/raw".into(),
            token: "s3cr3t".into(),
            root_ca_pem: None,
            write_precision: Some(WritePrecision::Seconds),
        }
    }

    fn point() -> DataPoint {
        let mut p = DataPoint::new("BME280");
        p.add_tag("device", "ESP32").unwrap();
        p.add_field("temperature", FieldValue::float(21.0)).unwrap();
        p
    }

    #[test]
    fn write_url_is_encoded() {
        let c = InfluxClient::new(SimHttpTransport::new(), &backend());
        assert_eq!(
            c.write_url(),
            "https://influx.example.com/api/v2/write?org=Acme%20Labs&bucket=env%2Fraw&precision=s"
        );
        assert_eq!(c.server_url(), "https://influx.example.com");
    }

    #[test]
    fn publish_sends_authorized_line() {
        let mut c = InfluxClient::new(SimHttpTransport::new(), &backend());
        c.publish(&point()).unwrap();
        let req = &c.transport().requests()[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header("Authorization"), Some("Token s3cr3t"));
        assert_eq!(req.body, "BME280,device=ESP32 temperature=21.00");
        assert_eq!(req.header("Content-Length"), Some("37"));
    }

    #[test]
    fn unauthorized_write_keeps_server_message() {
        let mut c = InfluxClient::new(SimHttpTransport::new(), &backend());
        c.transport_mut()
            .push_response(401, r#"{"code":"unauthorized","message":"unauthorized access"}"#);
        assert_eq!(c.publish(&point()), Err(TelemetryError::Unauthorized));
        assert_eq!(c.last_error_message(), Some("unauthorized access"));

        // next write is independent
        c.publish(&point()).unwrap();
        assert_eq!(c.last_error_message(), None);
    }

    #[test]
    fn rejected_write_reports_status() {
        let mut c = InfluxClient::new(SimHttpTransport::new(), &backend());
        c.transport_mut().push_response(
            400,
            r#"{"code":"invalid","message":"unable to parse 'x': missing fields"}"#,
        );
        assert_eq!(
            c.publish(&point()),
            Err(TelemetryError::Rejected { status: 400 })
        );
        assert_eq!(
            c.last_error_message(),
            Some("unable to parse 'x': missing fields")
        );
    }

    #[test]
    fn transport_error_is_surfaced() {
        let mut c = InfluxClient::new(SimHttpTransport::new(), &backend());
        c.transport_mut().push_error(TelemetryError::Tls);
        assert_eq!(c.publish(&point()), Err(TelemetryError::Tls));
        assert_eq!(c.last_error_message(), Some("TLS handshake failed"));
    }

    #[test]
    fn empty_point_is_not_transmitted() {
        let mut c = InfluxClient::new(SimHttpTransport::new(), &backend());
        let p = DataPoint::new("BME280");
        assert_eq!(c.publish(&p), Err(TelemetryError::EmptyPoint));
        assert!(c.transport().requests().is_empty());
    }

    #[test]
    fn validate_parses_health() {
        let mut c = InfluxClient::new(SimHttpTransport::new(), &backend());
        let info = c.validate().unwrap();
        assert_eq!(info.name, "influxdb");
        assert_eq!(info.status, "pass");
        assert_eq!(c.transport().requests()[0].url, "https://influx.example.com/health");
    }

    #[test]
    fn validate_reports_failing_health() {
        let mut c = InfluxClient::new(SimHttpTransport::new(), &backend());
        c.transport_mut().push_response(
            503,
            r#"{"name":"influxdb","message":"database unavailable","status":"fail"}"#,
        );
        assert_eq!(c.validate(), Err(TelemetryError::Unhealthy));
        assert_eq!(c.last_error_message(), Some("database unavailable"));
    }

    #[test]
    fn parse_health_rejects_garbage() {
        assert_eq!(parse_health("not json"), Err(TelemetryError::Unhealthy));
        assert_eq!(parse_health(r#"{"status":"warn"}"#), Err(TelemetryError::Unhealthy));
        assert!(parse_health(r#"{"status":"pass"}"#).is_ok());
    }

    #[test]
    fn query_encoding() {
        assert_eq!(encode_query_value("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_query_value("plain-_.~"), "plain-_.~");
    }
}
