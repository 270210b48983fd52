//! Display helpers for byte counts, timestamps and hashes.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Placeholder shown for missing values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Format a byte count as Bytes/KB/MB/GB with two decimals above 1 KB.
pub fn format_size(size_bytes: Option<u64>) -> String {
    let Some(size) = size_bytes else {
        return NOT_AVAILABLE.to_string();
    };

    let value = size as f64;
    if value < KB {
        format!("{} Bytes", size)
    } else if value < MB {
        format!("{:.2} KB", value / KB)
    } else if value < GB {
        format!("{:.2} MB", value / MB)
    } else {
        format!("{:.2} GB", value / GB)
    }
}

/// Format an ISO 8601 timestamp in the local timezone.
pub fn format_date_time(iso: Option<&str>) -> String {
    format_date_time_in(iso, &Local)
}

/// Timestamps without an offset are treated as UTC (the registry stores
/// naive UTC values). Unparseable input is shown as-is.
pub fn format_date_time_in<Tz>(iso: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(raw) = iso.map(str::trim).filter(|s| !s.is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };

    match parse_timestamp(raw) {
        Some(utc) => utc
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => {
            log::debug!("Unrecognized timestamp: {}", raw);
            raw.to_string()
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// First 8 characters of a content hash followed by an ellipsis.
pub fn short_hash(hash: &str) -> String {
    let prefix: String = hash.chars().take(8).collect();
    format!("{}...", prefix)
}
