//! ESP-IDF HTTP client for `HttpTransport`.
//!
//! Compiled only for `target_os = "espidf"`.  Wraps `EspHttpConnection`
//! (esp_http_client + mbedTLS).  The connection is kept open between
//! requests and rebuilt after any transport error.

use core::time::Duration;

use log::{info, warn};

use esp_idf_svc::http::Method as EspMethod;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_svc::sys::{
    ESP_ERR_HTTP_CONNECT, ESP_ERR_HTTP_EAGAIN, ESP_ERR_TIMEOUT, EspError, esp_crt_bundle_attach,
};
use esp_idf_svc::tls::X509;

use super::{HttpResponse, HttpTransport, MAX_BODY, Method};
use crate::error::TelemetryError;

/// Socket timeout per request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EspHttpTransport {
    config: Configuration,
    conn: Option<EspHttpConnection>,
}

impl EspHttpTransport {
    /// `root_ca` must be NUL-terminated PEM; `None` uses the IDF
    /// certificate bundle.
    pub fn new(root_ca: Option<&'static [u8]>) -> Self {
        let config = Configuration {
            timeout: Some(REQUEST_TIMEOUT),
            server_certificate: root_ca.map(X509::pem_until_nul),
            crt_bundle_attach: if root_ca.is_none() {
                Some(esp_crt_bundle_attach)
            } else {
                None
            },
            ..Default::default()
        };
        info!(
            "HTTP(espidf): TLS trust = {}",
            if root_ca.is_some() { "configured root CA" } else { "certificate bundle" }
        );
        Self { config, conn: None }
    }

    fn connection(&mut self) -> Result<&mut EspHttpConnection, TelemetryError> {
        if self.conn.is_none() {
            let conn = EspHttpConnection::new(&self.config).map_err(|e| {
                warn!("HTTP(espidf): client init failed: {}", e);
                TelemetryError::Connect
            })?;
            self.conn = Some(conn);
        }
        self.conn.as_mut().ok_or(TelemetryError::Connect)
    }

    fn exchange(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TelemetryError> {
        let conn = self.connection()?;
        let m = match method {
            Method::Get => EspMethod::Get,
            Method::Post => EspMethod::Post,
        };
        conn.initiate_request(m, url, headers).map_err(classify)?;

        let mut written = 0;
        while written < body.len() {
            written += conn.write(&body[written..]).map_err(classify)?;
        }
        conn.initiate_response().map_err(classify)?;
        let status = conn.status();

        let mut out = Vec::with_capacity(256);
        let mut buf = [0u8; 256];
        loop {
            let n = conn.read(&mut buf).map_err(classify)?;
            if n == 0 {
                break;
            }
            // Keep draining past the cap so the connection can be reused.
            let room = MAX_BODY.saturating_sub(out.len());
            out.extend_from_slice(&buf[..n.min(room)]);
        }
        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&out).into_owned(),
        })
    }
}

fn classify(e: EspError) -> TelemetryError {
    warn!("HTTP(espidf): {}", e);
    match e.code() {
        c if c == ESP_ERR_HTTP_CONNECT as i32 => TelemetryError::Connect,
        c if c == ESP_ERR_TIMEOUT as i32 || c == ESP_ERR_HTTP_EAGAIN as i32 => {
            TelemetryError::Timeout
        }
        _ => TelemetryError::Io,
    }
}

impl HttpTransport for EspHttpTransport {
    fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TelemetryError> {
        let result = self.exchange(method, url, headers, body);
        if let Err(e) = result {
            warn!("HTTP(espidf): {:?} {} failed: {}", method, url, e);
            self.conn = None;
        }
        result
    }
}
