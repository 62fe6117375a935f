//! Human-readable renderings for listings.

use chrono::{DateTime, Utc};

pub use crate::storage::format_version;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with binary (1024) steps: `512 B`, `1.5 KB`, `3.2 GB`.
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, SIZE_UNITS[0])
    } else {
        format!("{:.1} {}", size, SIZE_UNITS[unit])
    }
}

/// Formats how long ago `time` was, relative to `now`: `just now`, `5 minutes ago`.
pub fn format_age_at(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - time).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let (count, unit) = match seconds {
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{} {}{} ago", count, unit, plural)
}

pub fn format_age(time: DateTime<Utc>) -> String {
    format_age_at(time, Utc::now())
}
