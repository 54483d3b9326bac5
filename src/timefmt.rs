// src/timefmt.rs

//! Textual encoding of instants and durations.
//!
//! Instants are encoded as RFC 3339 / ISO-8601 text with whatever sub-second
//! precision is needed for an exact round trip. Durations reuse the instant
//! codec: a duration is encoded by adding it to a fixed reference epoch
//! (`0001-01-01T00:00:00Z`) and encoding the resulting instant; decoding
//! subtracts the same epoch. The indirection keeps the on-disk vocabulary to
//! a single timestamp format.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};

use crate::errors::{Result, SchedError};

/// Current wall-clock instant.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Reference epoch used for the duration encoding.
fn zero_epoch() -> DateTime<Utc> {
    // Year 1 is well within chrono's representable range.
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .expect("reference epoch is a valid calendar date")
}

/// Encode an instant as RFC 3339 text.
///
/// `SecondsFormat::AutoSi` emits the shortest sub-second representation that
/// still round-trips exactly through [`decode_instant`].
pub fn encode_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Decode an RFC 3339 instant; malformed text is a [`SchedError::Format`].
pub fn decode_instant(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| SchedError::Format(format!("invalid timestamp {text:?}: {err}")))
}

/// Encode a duration as the instant `zero_epoch + duration`.
///
/// Negative durations are rejected; intervals in this crate are always >= 0.
pub fn encode_duration(duration: TimeDelta) -> Result<String> {
    if duration < TimeDelta::zero() {
        return Err(SchedError::Format(format!(
            "cannot encode negative duration: {duration}"
        )));
    }
    let instant = zero_epoch()
        .checked_add_signed(duration)
        .ok_or_else(|| SchedError::Format(format!("duration out of range: {duration}")))?;
    Ok(encode_instant(instant))
}

/// Decode a duration previously produced by [`encode_duration`].
pub fn decode_duration(text: &str) -> Result<TimeDelta> {
    let instant = decode_instant(text)?;
    Ok(instant.signed_duration_since(zero_epoch()))
}
