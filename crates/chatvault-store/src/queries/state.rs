//! Scanner checkpoints and the backfill audit log.
//!
//! State lives inside the archive itself so checkpoint updates commit
//! atomically with the data they describe.

use rusqlite::{params, Connection, OptionalExtension};

use crate::records::BackfillEntry;
use crate::Result;

/// Reserved checkpoint keys. Backfill audit entries use the
/// `backfill_<source>_<unix-ms>` pattern instead.
pub const LAST_SCAN_TIMESTAMP: &str = "last_scan_timestamp";
pub const LAST_EVENTS_SCAN_TIMESTAMP: &str = "last_events_scan_timestamp";
pub const LAST_SESSIONS_SCAN_TIMESTAMP: &str = "last_sessions_scan_timestamp";

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM scanner_state WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set(conn: &Connection, key: &str, value: &str, now: i64) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO scanner_state (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3
        "#,
        params![key, value, now],
    )?;
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<(String, String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT key, value, updated_at FROM scanner_state ORDER BY key")?;

    let entries = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(entries)
}

/// Record one bulk-backfill run for later audit.
pub fn record_backfill(conn: &Connection, entry: &BackfillEntry) -> Result<()> {
    let key = format!("backfill_{}_{}", entry.source, entry.recorded_at);
    let value = serde_json::json!({
        "source": entry.source,
        "path": entry.path,
        "inserted": entry.inserted,
        "skipped": entry.skipped,
        "recorded_at": entry.recorded_at,
    });
    set(conn, &key, &value.to_string(), entry.recorded_at)
}

/// Read a checkpoint as epoch milliseconds, treating absent or malformed
/// values as zero (never scanned).
pub fn watermark(conn: &Connection, key: &str) -> Result<i64> {
    Ok(get(conn, key)?
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0))
}
