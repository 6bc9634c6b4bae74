//! Timestamp normalization (C1).
//!
//! Events arrive with a wire timestamp whose unit (seconds or
//! milliseconds) is not tagged; the rule inherited from the bridge is
//! that anything larger than 1e10 is milliseconds.

const MS_THRESHOLD: f64 = 1e10;

/// Normalizes a raw wire timestamp to seconds since epoch.
pub fn normalize_timestamp(raw: f64) -> f64 {
    if raw > MS_THRESHOLD {
        raw / 1000.0
    } else {
        raw
    }
}

/// Formats a seconds-since-epoch timestamp as `HH:MM:SS` in the local
/// timezone, matching the display convention used throughout the thinking
/// log and chat history views.
pub fn format_local_hms(timestamp_s: f64) -> String {
    let unix = time::OffsetDateTime::from_unix_timestamp(timestamp_s as i64)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    let local = unix
        .to_offset(time::UtcOffset::local_offset_at(unix).unwrap_or(time::UtcOffset::UTC));
    format!(
        "{:02}:{:02}:{:02}",
        local.hour(),
        local.minute(),
        local.second()
    )
}
