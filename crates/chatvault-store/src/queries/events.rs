use chatvault_types::{ArchiveEvent, EventKind, ThinkingPayload, UsagePayload};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use rusqlite::types::Type;
use serde_json::Value;

use crate::records::{EventFilter, SessionListEntry, SessionStats};
use crate::Result;

/// How a row-level insert failed inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertFailure {
    /// Uniqueness conflict: normal under re-ingest, counted as skipped.
    Duplicate,
    /// Foreign-key violation: parent event absent, row is dropped.
    Referential,
}

/// Classify a rusqlite error into the batch counter it feeds.
pub fn classify_constraint(err: &rusqlite::Error) -> Option<InsertFailure> {
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = err {
        if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation {
            return match ffi_err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(InsertFailure::Referential),
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Some(InsertFailure::Duplicate),
                _ => None,
            };
        }
    }
    None
}

pub fn exists(conn: &Connection, event_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM events WHERE event_id = ?1",
            [event_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Insert one event row plus its satellite row when the event carries a
/// thinking or usage payload.
pub fn insert(conn: &Connection, event: &ArchiveEvent, now: i64) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO events (
            event_id, parent_event_id, session_key, session_id, event_type,
            event_subtype, timestamp, ingested_at, raw_json, role, tool_name,
            provider, model_id, is_error, size_bytes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            &event.event_id,
            &event.parent_event_id,
            &event.session_key,
            &event.session_id,
            event.kind.as_str(),
            &event.event_subtype,
            event.timestamp,
            now,
            event.raw.to_string(),
            &event.role,
            &event.tool_name,
            &event.provider,
            &event.model_id,
            event.is_error,
            event.size_bytes,
        ],
    )?;
    let row_id = conn.last_insert_rowid();

    if event.kind == EventKind::ThinkingBlock {
        if let Some(thinking) = &event.thinking {
            conn.execute(
                r#"
                INSERT INTO thinking_blocks (event_id, content, signature, content_size, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    &event.event_id,
                    &thinking.content,
                    &thinking.signature,
                    thinking.content_size(),
                    event.timestamp,
                ],
            )?;
        }
    }

    if event.kind == EventKind::UsageStats {
        if let Some(usage) = &event.usage {
            conn.execute(
                r#"
                INSERT INTO usage_stats (
                    event_id, input_tokens, output_tokens, cache_read_tokens,
                    cache_write_tokens, total_tokens, input_cost, output_cost,
                    cache_read_cost, cache_write_cost, total_cost, provider,
                    model_id, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    &event.event_id,
                    usage.input_tokens,
                    usage.output_tokens,
                    usage.cache_read_tokens,
                    usage.cache_write_tokens,
                    usage.total_tokens,
                    usage.input_cost,
                    usage.output_cost,
                    usage.cache_read_cost,
                    usage.cache_write_cost,
                    usage.total_cost,
                    &event.provider,
                    &event.model_id,
                    event.timestamp,
                ],
            )?;
        }
    }

    Ok(row_id)
}

const EVENT_COLUMNS: &str = "e.event_id, e.parent_event_id, e.session_key, e.session_id, \
     e.event_type, e.event_subtype, e.timestamp, e.raw_json, e.role, e.tool_name, \
     e.provider, e.model_id, e.is_error, e.size_bytes, \
     t.content, t.signature, \
     u.input_tokens, u.output_tokens, u.cache_read_tokens, u.cache_write_tokens, \
     u.total_tokens, u.input_cost, u.output_cost, u.cache_read_cost, \
     u.cache_write_cost, u.total_cost";

/// Replay the events of one session in source order.
pub fn session_events(
    conn: &Connection,
    session_id: &str,
    filter: &EventFilter,
) -> Result<Vec<ArchiveEvent>> {
    let mut sql = format!(
        "SELECT {} FROM events e
         LEFT JOIN thinking_blocks t ON t.event_id = e.event_id
         LEFT JOIN usage_stats u ON u.event_id = e.event_id
         WHERE e.session_id = ?",
        EVENT_COLUMNS
    );
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(session_id.to_string())];

    if let Some(since) = filter.since {
        sql.push_str(" AND e.timestamp >= ?");
        args.push(Box::new(since));
    }
    if let Some(until) = filter.until {
        sql.push_str(" AND e.timestamp <= ?");
        args.push(Box::new(until));
    }
    if let Some(types) = &filter.types {
        let list = types
            .iter()
            .map(|t| format!("'{}'", t.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" AND e.event_type IN ({})", list));
    }
    if !filter.include_thinking {
        sql.push_str(" AND e.event_type != 'thinking_block'");
    }
    if !filter.include_usage {
        sql.push_str(" AND e.event_type != 'usage_stats'");
    }

    sql.push_str(" ORDER BY e.timestamp ASC, e.id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_event_row,
        )?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(rows)
}

/// Aggregate statistics for one session from the events table; the
/// denormalized counters on the session row are never consulted.
pub fn session_stats(conn: &Connection, session_id: &str) -> Result<SessionStats> {
    let mut stats = conn.query_row(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(event_type = 'message'), 0),
               COALESCE(SUM(event_type = 'tool_call'), 0),
               COALESCE(SUM(is_error), 0),
               MIN(timestamp),
               MAX(timestamp),
               COALESCE(SUM(size_bytes), 0)
        FROM events WHERE session_id = ?1
        "#,
        [session_id],
        |row| {
            Ok(SessionStats {
                total_events: row.get(0)?,
                message_count: row.get(1)?,
                tool_call_count: row.get(2)?,
                error_count: row.get(3)?,
                start_time: row.get(4)?,
                end_time: row.get(5)?,
                duration_seconds: 0.0,
                total_size_bytes: row.get(6)?,
                total_tokens: 0,
                total_cost: 0.0,
            })
        },
    )?;

    if let (Some(start), Some(end)) = (stats.start_time, stats.end_time) {
        stats.duration_seconds = (end - start) as f64 / 1000.0;
    }

    let (tokens, cost): (i64, f64) = conn.query_row(
        r#"
        SELECT COALESCE(SUM(u.total_tokens), 0), COALESCE(SUM(u.total_cost), 0)
        FROM usage_stats u
        JOIN events e ON e.event_id = u.event_id
        WHERE e.session_id = ?1
        "#,
        [session_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    stats.total_tokens = tokens;
    stats.total_cost = cost;

    Ok(stats)
}

/// Reconstruct a JSONL stream approximating the original event log.
///
/// Synthetic events are omitted (their content is already embedded in the
/// parent `message` line); `tool_result` events are re-emitted under
/// `type = "message"`, which is how they appeared on the wire.
pub fn export_session_jsonl(conn: &Connection, session_id: &str) -> Result<String> {
    let mut stmt = conn.prepare(
        "SELECT event_type, raw_json FROM events
         WHERE session_id = ?1
           AND event_type NOT IN ('tool_call', 'thinking_block', 'usage_stats')
         ORDER BY timestamp ASC, id ASC",
    )?;

    let rows = stmt
        .query_map([session_id], |row| {
            let event_type: String = row.get(0)?;
            let raw: String = row.get(1)?;
            Ok((event_type, raw))
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let mut out = String::new();
    for (event_type, raw) in rows {
        let mut value: Value = serde_json::from_str(&raw)?;
        if event_type == "tool_result" {
            if let Some(obj) = value.as_object_mut() {
                obj.insert("type".to_string(), Value::String("message".to_string()));
            }
        }
        out.push_str(&value.to_string());
        out.push('\n');
    }

    Ok(out)
}

/// Event-derived session listing: one entry per distinct session id.
pub fn list_sessions(conn: &Connection) -> Result<Vec<SessionListEntry>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, MAX(session_key), MIN(timestamp), MAX(timestamp), COUNT(*)
         FROM events
         WHERE session_id IS NOT NULL
         GROUP BY session_id
         ORDER BY MIN(timestamp) DESC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(SessionListEntry {
                session_id: row.get(0)?,
                session_key: row.get(1)?,
                first_timestamp: row.get(2)?,
                last_timestamp: row.get(3)?,
                event_count: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(rows)
}

fn map_event_row(row: &Row) -> rusqlite::Result<ArchiveEvent> {
    let type_text: String = row.get(4)?;
    let kind = EventKind::parse(&type_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unrecognized event type: {}", type_text).into(),
        )
    })?;

    let raw_text: String = row.get(7)?;
    let raw: Value = serde_json::from_str(&raw_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    let thinking = if kind == EventKind::ThinkingBlock {
        let content: Option<String> = row.get(14)?;
        let signature: Option<String> = row.get(15)?;
        content.map(|content| ThinkingPayload { content, signature })
    } else {
        None
    };

    let usage = if kind == EventKind::UsageStats {
        let total_tokens: Option<i64> = row.get(20)?;
        match total_tokens {
            Some(total) => Some(UsagePayload {
                input_tokens: row.get::<_, Option<i64>>(16)?.unwrap_or(0),
                output_tokens: row.get::<_, Option<i64>>(17)?.unwrap_or(0),
                cache_read_tokens: row.get::<_, Option<i64>>(18)?.unwrap_or(0),
                cache_write_tokens: row.get::<_, Option<i64>>(19)?.unwrap_or(0),
                total_tokens: total,
                input_cost: row.get::<_, Option<f64>>(21)?.unwrap_or(0.0),
                output_cost: row.get::<_, Option<f64>>(22)?.unwrap_or(0.0),
                cache_read_cost: row.get::<_, Option<f64>>(23)?.unwrap_or(0.0),
                cache_write_cost: row.get::<_, Option<f64>>(24)?.unwrap_or(0.0),
                total_cost: row.get::<_, Option<f64>>(25)?.unwrap_or(0.0),
            }),
            None => None,
        }
    } else {
        None
    };

    Ok(ArchiveEvent {
        event_id: row.get(0)?,
        parent_event_id: row.get(1)?,
        session_key: row.get(2)?,
        session_id: row.get(3)?,
        kind,
        event_subtype: row.get(5)?,
        timestamp: row.get(6)?,
        raw,
        role: row.get(8)?,
        tool_name: row.get(9)?,
        provider: row.get(10)?,
        model_id: row.get(11)?,
        is_error: row.get(12)?,
        size_bytes: row.get(13)?,
        thinking,
        usage,
    })
}
