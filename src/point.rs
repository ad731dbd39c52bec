//! Telemetry point builder and line-protocol encoder.
//!
//! One [`DataPoint`] lives for the node's whole run.  Tags are written once
//! at boot; fields (and the timestamp) are cleared and refilled every
//! cycle.  Storage is fixed-capacity so the per-cycle path never touches
//! the heap except when rendering the diagnostic echo.
//!
//! Wire format:
//!
//! ```text
//! BME280,device=ESP32 temperature=22.50,pressure=1013.25,humidity=45.00 1718000000
//! └─ measurement ─┘└ tags ┘ └──────────────── fields ────────────────┘ └ timestamp ┘
//! ```

use core::fmt::{self, Write};

use serde::{Deserialize, Serialize};

const MAX_TAGS: usize = 4;
const MAX_FIELDS: usize = 8;

pub type Key = heapless::String<32>;
pub type TagValue = heapless::String<64>;

/// Default decimal places for float fields.
pub const DEFAULT_DECIMALS: u8 = 2;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointError {
    /// Tag or field table is full.
    Capacity,
    /// Key or value longer than its fixed buffer.
    TooLong,
    /// NaN or infinite float, or a control character in a tag.
    Unrepresentable,
}

impl fmt::Display for PointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity => write!(f, "point capacity exceeded"),
            Self::TooLong => write!(f, "key or value too long"),
            Self::Unrepresentable => write!(f, "value has no line-protocol form"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Timestamp precision
// ───────────────────────────────────────────────────────────────

/// Unit of the trailing timestamp; the write request must advertise the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WritePrecision {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl WritePrecision {
    /// Query-string value for the write endpoint.
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Millis => "ms",
            Self::Micros => "us",
            Self::Nanos => "ns",
        }
    }

    /// Scale a Unix timestamp in nanoseconds to this precision.
    pub const fn scale_nanos(self, nanos: i64) -> i64 {
        match self {
            Self::Seconds => nanos / 1_000_000_000,
            Self::Millis => nanos / 1_000_000,
            Self::Micros => nanos / 1_000,
            Self::Nanos => nanos,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Field values
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Rendered with a fixed number of decimal places.
    Float { value: f64, decimals: u8 },
    Integer(i64),
    UnsignedInteger(u64),
    Boolean(bool),
    String(heapless::String<64>),
}

impl FieldValue {
    /// Float with the default two decimal places.
    pub fn float(value: impl Into<f64>) -> Self {
        Self::Float {
            value: value.into(),
            decimals: DEFAULT_DECIMALS,
        }
    }

    /// Line protocol has no spelling for NaN or infinity.
    fn is_representable(&self) -> bool {
        match self {
            Self::Float { value, .. } => value.is_finite(),
            _ => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float { value, .. } => Some(*value),
            Self::Integer(v) => Some(*v as f64),
            Self::UnsignedInteger(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut impl Write) -> fmt::Result {
        match self {
            Self::Float { value, decimals } => write!(out, "{:.*}", usize::from(*decimals), value),
            Self::Integer(v) => write!(out, "{v}i"),
            Self::UnsignedInteger(v) => write!(out, "{v}u"),
            Self::Boolean(v) => write!(out, "{v}"),
            Self::String(s) => {
                out.write_char('"')?;
                for c in s.chars() {
                    if matches!(c, '"' | '\\') {
                        out.write_char('\\')?;
                    }
                    out.write_char(c)?;
                }
                out.write_char('"')
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// DataPoint
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DataPoint {
    measurement: heapless::String<64>,
    tags: heapless::Vec<(Key, TagValue), MAX_TAGS>,
    fields: heapless::Vec<(Key, FieldValue), MAX_FIELDS>,
    timestamp: Option<i64>,
}

impl DataPoint {
    /// New point with no tags or fields.  Overlong names are truncated.
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: truncated(measurement),
            tags: heapless::Vec::new(),
            fields: heapless::Vec::new(),
            timestamp: None,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Add a tag.  Only called during boot.
    pub fn add_tag(&mut self, key: &str, value: &str) -> Result<(), PointError> {
        if key.chars().chain(value.chars()).any(char::is_control) {
            return Err(PointError::Unrepresentable);
        }
        let k = Key::try_from(key).map_err(|_| PointError::TooLong)?;
        let v = TagValue::try_from(value).map_err(|_| PointError::TooLong)?;
        self.tags.push((k, v)).map_err(|_| PointError::Capacity)
    }

    /// Drop every field and the timestamp; tags are kept.
    pub fn clear_fields(&mut self) {
        self.fields.clear();
        self.timestamp = None;
    }

    /// Add a field.  Non-finite floats are refused.
    pub fn add_field(&mut self, key: &str, value: FieldValue) -> Result<(), PointError> {
        if !value.is_representable() {
            return Err(PointError::Unrepresentable);
        }
        let k = Key::try_from(key).map_err(|_| PointError::TooLong)?;
        self.fields.push((k, value)).map_err(|_| PointError::Capacity)
    }

    /// Set the trailing timestamp, already scaled to the write precision.
    pub fn set_timestamp(&mut self, ts: Option<i64>) {
        self.timestamp = ts;
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Render the line protocol into any `fmt::Write` sink.
    pub fn write_line_protocol(&self, out: &mut impl Write) -> fmt::Result {
        escape(out, &self.measurement, &[',', ' '])?;
        for (k, v) in &self.tags {
            out.write_char(',')?;
            escape(out, k, &[',', '=', ' '])?;
            out.write_char('=')?;
            escape(out, v, &[',', '=', ' '])?;
        }
        for (i, (k, v)) in self.fields.iter().enumerate() {
            out.write_char(if i == 0 { ' ' } else { ',' })?;
            escape(out, k, &[',', '=', ' '])?;
            out.write_char('=')?;
            v.write_to(out)?;
        }
        if let Some(ts) = self.timestamp {
            write!(out, " {ts}")?;
        }
        Ok(())
    }

    pub fn to_line_protocol(&self) -> String {
        let mut s = String::with_capacity(128);
        // Writing into a String cannot fail.
        let _ = self.write_line_protocol(&mut s);
        s
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_line_protocol(f)
    }
}

fn escape(out: &mut impl Write, s: &str, special: &[char]) -> fmt::Result {
    for c in s.chars() {
        if special.contains(&c) {
            out.write_char('\\')?;
        }
        out.write_char(c)?;
    }
    Ok(())
}

fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
