//! Defensive parsing for loosely-typed upstream fields.
//!
//! Venue payloads deliver numbers as JSON numbers or as quoted strings, and
//! any field can be missing. A malformed field degrades to `None` (or the
//! `"-"` sentinel for timestamps) so one bad upstream value costs a single
//! row field, never the request.

use serde::Deserialize;

use crate::domain::UtcDateTime;

/// Rendered in place of a timestamp that could not be parsed.
pub const TIMESTAMP_SENTINEL: &str = "-";

/// A numeric upstream field that may arrive as a number or as text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawNum {
    Num(f64),
    Text(String),
}

impl RawNum {
    /// Finite numeric value, or `None` for anything unusable.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Num(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Lenient read of an optional numeric field.
pub fn float_field(field: &Option<RawNum>) -> Option<f64> {
    field.as_ref().and_then(RawNum::as_f64)
}

/// Millisecond epoch field to ISO-8601 UTC at second precision.
///
/// Anything unparseable yields [`TIMESTAMP_SENTINEL`].
pub fn ms_to_iso(field: &Option<RawNum>) -> String {
    let Some(ms) = float_field(field) else {
        return String::from(TIMESTAMP_SENTINEL);
    };

    if ms < i64::MIN as f64 || ms > i64::MAX as f64 {
        return String::from(TIMESTAMP_SENTINEL);
    }

    match UtcDateTime::from_unix_ms(ms as i64) {
        Ok(ts) => ts.format_rfc3339(),
        Err(_) => String::from(TIMESTAMP_SENTINEL),
    }
}

/// Trimmed string field, `None` when missing or blank.
pub fn text_field(field: &Option<String>) -> Option<String> {
    field
        .as_ref()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}
