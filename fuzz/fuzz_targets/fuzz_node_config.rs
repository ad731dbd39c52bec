//! Fuzz target: `NodeConfig::from_json`
//!
//! Arbitrary provisioning documents must be either rejected with a typed
//! error or produce a configuration that passes its own validation.
//!
//! cargo fuzz run fuzz_node_config

#![no_main]

use envnode::config::NodeConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = NodeConfig::from_json(data) {
        assert!(config.validate().is_ok(), "from_json must only accept valid configs");
    }
});
