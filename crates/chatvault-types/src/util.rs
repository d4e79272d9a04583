use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Parse an ISO-8601 timestamp string to epoch milliseconds.
pub fn parse_iso_millis(ts: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

/// Render epoch milliseconds as an ISO-8601 UTC string.
pub fn format_iso_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => millis.to_string(),
    }
}

/// Current wall-clock time, epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Truncate a string to a maximum character count, appending an ellipsis
/// when anything was cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>() + "..."
    }
}
