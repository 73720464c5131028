//! UTC timestamp helpers.
//!
//! Provenance timestamps travel as UTC ISO-8601 strings; object metadata and
//! version publish times travel as epoch milliseconds. These helpers convert
//! between the two so that every comparison happens on parsed instants.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::TypeError;

/// Parse an RFC 3339 / ISO-8601 timestamp and normalize it to UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TypeError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Render an instant as a UTC ISO-8601 string with millisecond precision,
/// e.g. `2021-03-04T05:06:07.080Z`.
///
/// Sub-millisecond digits are truncated, matching the epoch-millisecond
/// resolution of store metadata. The fixed width keeps rendered strings in
/// the same order as the instants they encode.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert epoch milliseconds into a UTC instant.
pub fn from_epoch_ms(epoch_ms: i64) -> Result<DateTime<Utc>, TypeError> {
    DateTime::from_timestamp_millis(epoch_ms).ok_or_else(|| TypeError::InvalidTimestamp {
        value: epoch_ms.to_string(),
        reason: "epoch milliseconds out of range".into(),
    })
}
