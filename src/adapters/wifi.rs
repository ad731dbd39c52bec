//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`] over up to four candidate access points.
//! `ensure_connected` is cheap while associated; when the link is down it
//! makes exactly one association attempt and reports the result.  The boot
//! wait and its retry policy live in the node service, not here.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`.  Each
//!   attempt scans and joins the strongest configured SSID in range.
//! - **all other targets**: round-robin simulation over the candidates with
//!   injectable association failures and link drops.

use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use super::utils::{passphrase_ok, ssid_ok};
use crate::app::ports::{LinkPort, LinkState};
use crate::config::{MAX_WIFI_CANDIDATES, WifiCandidate};
use crate::error::LinkError;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_candidates(
    candidates: &[WifiCandidate],
) -> Result<heapless::Vec<WifiCandidate, MAX_WIFI_CANDIDATES>, LinkError> {
    if candidates.is_empty() {
        return Err(LinkError::NoCandidates);
    }
    let mut out = heapless::Vec::new();
    for c in candidates {
        if !ssid_ok(&c.ssid) {
            return Err(LinkError::InvalidSsid);
        }
        if !passphrase_ok(&c.password) {
            return Err(LinkError::InvalidPassword);
        }
        out.push(c.clone()).map_err(|_| LinkError::TooManyCandidates)?;
    }
    Ok(out)
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    candidates: heapless::Vec<WifiCandidate, MAX_WIFI_CANDIDATES>,
    state: LinkState,
    /// Index of the candidate currently associated.
    current: Option<usize>,
    attempts: u32,
    last_rssi: Option<i8>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: next candidate to try.
    #[cfg(not(target_os = "espidf"))]
    sim_next: usize,
    /// Simulation: association attempts still to fail.
    #[cfg(not(target_os = "espidf"))]
    sim_fail_remaining: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(
        wifi: BlockingWifi<EspWifi<'static>>,
        candidates: &[WifiCandidate],
    ) -> Result<Self, LinkError> {
        Ok(Self {
            candidates: validate_candidates(candidates)?,
            state: LinkState::Disconnected,
            current: None,
            attempts: 0,
            last_rssi: None,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(candidates: &[WifiCandidate]) -> Result<Self, LinkError> {
        Ok(Self {
            candidates: validate_candidates(candidates)?,
            state: LinkState::Disconnected,
            current: None,
            attempts: 0,
            last_rssi: None,
            sim_next: 0,
            sim_fail_remaining: 0,
        })
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// SSID of the associated access point.
    pub fn connected_ssid(&self) -> Option<&str> {
        self.current
            .and_then(|i| self.candidates.get(i))
            .map(|c| c.ssid.as_str())
    }

    /// Association attempts made since construction.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Option<usize> {
        if !self.wifi.is_started().unwrap_or(false) {
            let idle = Configuration::Client(ClientConfiguration::default());
            if let Err(e) = self
                .wifi
                .set_configuration(&idle)
                .and_then(|()| self.wifi.start())
            {
                warn!("WiFi(espidf): driver start failed: {}", e);
                return None;
            }
        }

        let aps = match self.wifi.scan() {
            Ok(aps) => aps,
            Err(e) => {
                warn!("WiFi(espidf): scan failed: {}", e);
                return None;
            }
        };
        let (index, rssi) = aps
            .iter()
            .filter_map(|ap| {
                self.candidates
                    .iter()
                    .position(|c| c.ssid == ap.ssid)
                    .map(|i| (i, ap.signal_strength))
            })
            .max_by_key(|(_, rssi)| *rssi)?;

        let c = &self.candidates[index];
        info!("WiFi(espidf): joining '{}' ({} dBm)", c.ssid, rssi);
        let conf = Configuration::Client(ClientConfiguration {
            ssid: c.ssid.clone(),
            password: c.password.clone(),
            auth_method: if c.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        let joined = self
            .wifi
            .set_configuration(&conf)
            .and_then(|()| self.wifi.connect())
            .and_then(|()| self.wifi.wait_netif_up());
        match joined {
            Ok(()) => Some(index),
            Err(e) => {
                warn!("WiFi(espidf): association with '{}' failed: {}", c.ssid, e);
                None
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Option<usize> {
        let index = self.sim_next % self.candidates.len();
        self.sim_next = self.sim_next.wrapping_add(1);
        if self.sim_fail_remaining > 0 {
            self.sim_fail_remaining -= 1;
            warn!(
                "WiFi(sim): '{}' refused association",
                self.candidates[index].ssid
            );
            return None;
        }
        Some(index)
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: `ap_info` is a valid out-pointer for the duration of the call.
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (rc == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        // Weaker for later candidates so tests can tell them apart.
        self.current.map(|i| -50 - 5 * i as i8)
    }

    // ── Simulation controls ───────────────────────────────────

    /// Make the next `n` association attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next(&mut self, n: u32) {
        self.sim_fail_remaining = n;
    }

    /// Drop the current association as if the AP went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.state = LinkState::Disconnected;
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiAdapter {
    fn ensure_connected(&mut self) -> LinkState {
        if self.state == LinkState::Connected && self.platform_is_connected() {
            return LinkState::Connected;
        }
        if self.state == LinkState::Connected {
            warn!("WiFi: connection lost, reassociating");
        }
        self.state = LinkState::Disconnected;
        self.current = None;
        self.last_rssi = None;

        self.attempts = self.attempts.saturating_add(1);
        if let Some(index) = self.platform_connect() {
            self.state = LinkState::Connected;
            self.current = Some(index);
            self.last_rssi = self.platform_rssi();
            info!(
                "WiFi: connected to '{}' (RSSI={:?})",
                self.candidates[index].ssid, self.last_rssi
            );
        }
        self.state
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
