//! Fuzz target: `influx::parse_health`
//!
//! Feeds arbitrary bodies to the `/health` parser.  It must never panic
//! and may only report a healthy server for a `"status":"pass"` document.
//!
//! cargo fuzz run fuzz_health_parser

#![no_main]

use envnode::adapters::influx::parse_health;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    if let Ok(info) = parse_health(&body) {
        assert_eq!(info.status, "pass");
    }
});
