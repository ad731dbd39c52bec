//! SNTP time synchronisation adapter.
//!
//! Implements [`TimeSyncPort`]: sets the POSIX time zone, starts SNTP with
//! the configured servers and waits a bounded time for the first sync.
//! There is no error path; an unsynced clock shows up later as a failed
//! TLS handshake and as points sent without a timestamp.
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::sntp::EspSntp`.  The
//!   service handle is kept so SNTP keeps correcting drift.
//! - **all other targets**: the host clock is already synced; the call is
//!   recorded and logged.

use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};

use crate::app::ports::TimeSyncPort;

/// Upper bound on the boot-time wait for the first sync.
pub const SYNC_TIMEOUT_MS: u32 = 10_000;

#[cfg(target_os = "espidf")]
const POLL_MS: u32 = 100;

pub struct SntpTimeSync {
    #[cfg(target_os = "espidf")]
    sntp: Option<EspSntp<'static>>,
    synced: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_last: Option<(String, Vec<String>)>,
}

impl Default for SntpTimeSync {
    fn default() -> Self {
        Self::new()
    }
}

impl SntpTimeSync {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,
            synced: false,
            #[cfg(not(target_os = "espidf"))]
            sim_last: None,
        }
    }

    /// Whether the first sync completed within the timeout.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Time zone and servers passed to the last `sync_time` call.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_last_request(&self) -> Option<(&str, &[String])> {
        self.sim_last
            .as_ref()
            .map(|(tz, servers)| (tz.as_str(), servers.as_slice()))
    }

    #[cfg(target_os = "espidf")]
    fn platform_set_tz(tz: &str) {
        // SAFETY: called once during single-threaded boot, before any task
        // reads the environment.
        unsafe {
            std::env::set_var("TZ", tz);
            esp_idf_svc::sys::tzset();
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_sync(&mut self, servers: &[&str]) -> bool {
        let mut conf = SntpConf::default();
        for (slot, server) in conf.servers.iter_mut().zip(servers) {
            *slot = *server;
        }
        if servers.len() > conf.servers.len() {
            warn!(
                "SNTP: only {} server slot(s) available, ignoring the rest",
                conf.servers.len()
            );
        }
        let sntp = match EspSntp::new(&conf) {
            Ok(s) => s,
            Err(e) => {
                warn!("SNTP: start failed: {}", e);
                return false;
            }
        };

        let mut waited = 0;
        while sntp.get_sync_status() != SyncStatus::Completed && waited < SYNC_TIMEOUT_MS {
            std::thread::sleep(core::time::Duration::from_millis(u64::from(POLL_MS)));
            waited += POLL_MS;
        }
        let done = sntp.get_sync_status() == SyncStatus::Completed;
        self.sntp = Some(sntp);
        done
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_tz(_tz: &str) {}

    #[cfg(not(target_os = "espidf"))]
    fn platform_sync(&mut self, _servers: &[&str]) -> bool {
        true
    }
}

impl TimeSyncPort for SntpTimeSync {
    fn sync_time(&mut self, tz: &str, servers: &[&str]) {
        info!("SNTP: TZ='{}', servers={:?}", tz, servers);
        Self::platform_set_tz(tz);
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_last = Some((tz.to_owned(), servers.iter().map(|s| (*s).to_owned()).collect()));
        }

        self.synced = self.platform_sync(servers);
        if self.synced {
            info!("SNTP: wall clock synchronised");
        } else {
            warn!("SNTP: no sync within {} ms, continuing", SYNC_TIMEOUT_MS);
        }
    }
}
