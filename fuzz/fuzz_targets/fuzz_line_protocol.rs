//! Fuzz target: `DataPoint::write_line_protocol`
//!
//! Splits the input into a measurement, one tag value and a field key,
//! builds a point and asserts that rendering never panics, is stable, and
//! that clearing the fields leaves the tag set untouched.
//!
//! cargo fuzz run fuzz_line_protocol

#![no_main]

use envnode::point::{DataPoint, FieldValue};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let mut parts = text.splitn(3, '\u{0}');
    let measurement = parts.next().unwrap_or_default();
    let tag = parts.next().unwrap_or("ESP32");
    let key = parts.next().unwrap_or("temperature");

    let mut p = DataPoint::new(measurement);
    // The measurement is truncated; overlong or control-character tags
    // and keys are refused.
    if p.add_tag("device", tag).is_err() || p.add_field(key, FieldValue::float(21.5)).is_err() {
        return;
    }
    let line = p.to_line_protocol();
    assert!(line.contains("device="), "tag set must be rendered");

    // Re-rendering is stable.
    assert_eq!(line, p.to_string());

    p.clear_fields();
    assert!(!p.has_fields());
    assert_eq!(p.tags().count(), 1, "clearing fields must keep tags");
});
