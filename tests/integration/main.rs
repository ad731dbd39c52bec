//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the node end to end
//! against the host simulations of the link, backend and sensor chip.
//! All tests run on the host (x86_64) with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod boot_tests;
mod cycle_tests;
mod mock_node;
