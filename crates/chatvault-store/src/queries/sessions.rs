use chatvault_types::{SessionData, SessionStatus, SessionType};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::records::SessionFilter;
use crate::{Error, Result};

const SESSION_COLUMNS: &str = "s.id, s.session_key, s.session_type, s.parent_session_id, \
     s.label, s.agent_id, s.model, s.started_at, s.ended_at, s.status, s.title, \
     s.summary, s.message_count, s.event_count";

/// Insert-or-update keyed by session id. Optional fields already present in
/// the row are preserved when the incoming value is null. Returns true when
/// a new row was inserted.
pub fn upsert(conn: &Connection, session: &SessionData, now: i64) -> Result<bool> {
    let existed: Option<i64> = conn
        .query_row(
            "SELECT rowid FROM sessions WHERE id = ?1",
            [&session.id],
            |row| row.get(0),
        )
        .optional()?;

    conn.execute(
        r#"
        INSERT INTO sessions (
            id, session_key, session_type, parent_session_id, label, agent_id,
            model, started_at, ended_at, status, title, summary, message_count,
            event_count, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
        ON CONFLICT(id) DO UPDATE SET
            session_key = COALESCE(?2, session_key),
            session_type = ?3,
            parent_session_id = COALESCE(?4, parent_session_id),
            label = COALESCE(?5, label),
            agent_id = COALESCE(?6, agent_id),
            model = COALESCE(?7, model),
            started_at = COALESCE(?8, started_at),
            ended_at = COALESCE(?9, ended_at),
            status = ?10,
            title = COALESCE(?11, title),
            summary = COALESCE(?12, summary),
            message_count = ?13,
            event_count = ?14,
            updated_at = ?15
        "#,
        params![
            &session.id,
            &session.session_key,
            session.session_type.as_str(),
            &session.parent_session_id,
            &session.label,
            &session.agent_id,
            &session.model,
            session.started_at,
            session.ended_at,
            session.status.as_str(),
            &session.title,
            &session.summary,
            session.message_count,
            session.event_count,
            now,
        ],
    )?;

    Ok(existed.is_none())
}

pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<SessionData>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sessions s WHERE s.id = ?1",
        SESSION_COLUMNS
    ))?;

    let mut rows = stmt.query([session_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(map_session_row(row)?)),
        None => Ok(None),
    }
}

pub fn query(conn: &Connection, filter: &SessionFilter) -> Result<Vec<SessionData>> {
    let mut sql = format!("SELECT {} FROM sessions s", SESSION_COLUMNS);
    let mut conditions: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(session_type) = filter.session_type {
        conditions.push("s.session_type = ?");
        args.push(Box::new(session_type.as_str()));
    }
    if let Some(status) = filter.status {
        conditions.push("s.status = ?");
        args.push(Box::new(status.as_str()));
    }
    if let Some(agent_id) = &filter.agent_id {
        conditions.push("s.agent_id = ?");
        args.push(Box::new(agent_id.clone()));
    }
    if let Some(since) = filter.since {
        conditions.push("s.started_at >= ?");
        args.push(Box::new(since));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY s.started_at DESC LIMIT ?");
    args.push(Box::new(filter.limit.map(|l| l as i64).unwrap_or(-1)));

    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_session_row,
        )?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(sessions)
}

/// Ranked full-text search over session titles and summaries.
pub fn search(conn: &Connection, query_text: &str, limit: usize) -> Result<Vec<SessionData>> {
    let sql = format!(
        "SELECT {} FROM sessions s
         JOIN sessions_fts f ON f.rowid = s.rowid
         WHERE f.sessions_fts MATCH ?1
         ORDER BY f.rank LIMIT ?2",
        SESSION_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(params![query_text, limit as i64], map_session_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(sessions)
}

/// Resolve a session id from a prefix (supports short ids like "7f2abd2d").
pub fn find_by_prefix(conn: &Connection, prefix: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM sessions WHERE id LIKE ?1
         UNION
         SELECT session_id FROM events WHERE session_id LIKE ?1
         LIMIT 2",
    )?;

    let pattern = format!("{}%", prefix);
    let mut matches: Vec<String> = stmt
        .query_map([&pattern], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(Error::Query(format!(
            "Ambiguous session ID prefix '{}': multiple sessions match",
            prefix
        ))),
    }
}

/// Recompute the denormalized per-session counters from the events table.
pub fn refresh_counts(conn: &Connection, session_id: &str, now: i64) -> Result<()> {
    conn.execute(
        r#"
        UPDATE sessions SET
            event_count = (SELECT COUNT(*) FROM events WHERE session_id = ?1),
            message_count = (
                SELECT COUNT(*) FROM events
                WHERE session_id = ?1 AND event_type = 'message'
            ),
            updated_at = ?2
        WHERE id = ?1
        "#,
        params![session_id, now],
    )?;
    Ok(())
}

fn map_session_row(row: &Row) -> rusqlite::Result<SessionData> {
    let type_text: String = row.get(2)?;
    let session_type = SessionType::parse(&type_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unrecognized session type: {}", type_text).into(),
        )
    })?;

    let status_text: String = row.get(9)?;
    let status = SessionStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            Type::Text,
            format!("unrecognized session status: {}", status_text).into(),
        )
    })?;

    Ok(SessionData {
        id: row.get(0)?,
        session_key: row.get(1)?,
        session_type,
        parent_session_id: row.get(3)?,
        label: row.get(4)?,
        agent_id: row.get(5)?,
        model: row.get(6)?,
        started_at: row.get(7)?,
        ended_at: row.get(8)?,
        status,
        title: row.get(10)?,
        summary: row.get(11)?,
        message_count: row.get(12)?,
        event_count: row.get(13)?,
    })
}
