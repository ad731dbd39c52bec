//! Credential and endpoint checks shared by the WiFi adapter and
//! configuration validation.

/// Printable ASCII, `0x20..=0x7E`.
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// 1-32 printable ASCII bytes (802.11 SSID limit).
pub(crate) fn ssid_ok(ssid: &str) -> bool {
    !ssid.is_empty() && ssid.len() <= 32 && is_printable_ascii(ssid)
}

/// Empty for an open network, otherwise a WPA2 passphrase of 8-64 bytes.
pub(crate) fn passphrase_ok(password: &str) -> bool {
    password.is_empty() || (8..=64).contains(&password.len())
}

/// 1-`max` bytes with no control characters; tag keys, tag values and the
/// measurement name end up verbatim in a single protocol line.
pub(crate) fn label_ok(s: &str, max: usize) -> bool {
    !s.is_empty() && s.len() <= max && !s.chars().any(char::is_control)
}

/// `http://` or `https://` followed by a host.
pub(crate) fn http_url_ok(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.starts_with('/') && is_printable_ascii(r) && !r.contains(' '))
}
