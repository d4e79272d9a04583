use chatvault_types::util::format_iso_millis;
use chatvault_types::{identity, AttachmentRecord, ContentType, Direction, MessageRecord};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde_json::Value;

use crate::records::{EditRow, MessageFilter, ReactionRow, StoredMessage};
use crate::Result;

/// Half-width of the near-duplicate window, milliseconds.
const NEAR_DUPLICATE_WINDOW_MS: i64 = 1000;

const MESSAGE_COLUMNS: &str = "m.id, m.message_id, m.internal_id, m.session_key, m.session_id, \
     m.direction, m.sender_id, m.sender_name, m.recipient_id, m.recipient_name, \
     m.channel, m.device_id, m.content_type, m.content_text, m.raw_json, \
     m.fingerprint, m.reply_to_id, m.thread_id, m.timestamp, m.edited_at, \
     m.deleted_at, m.ingested_at";

pub fn fingerprint_for(record: &MessageRecord) -> String {
    identity::message_fingerprint(
        record.sender_id.as_deref().unwrap_or(""),
        record.timestamp,
        record.content_text.as_deref().unwrap_or(""),
    )
}

/// Three-stage duplicate predicate: exact id, fingerprint, near-duplicate.
/// Each stage short-circuits; the last is bounded by the
/// `(sender_id, timestamp)` index.
pub fn is_duplicate(conn: &Connection, record: &MessageRecord, fingerprint: &str) -> Result<bool> {
    let by_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM messages WHERE message_id = ?1",
            [&record.message_id],
            |row| row.get(0),
        )
        .optional()?;
    if by_id.is_some() {
        return Ok(true);
    }

    let by_fingerprint: Option<i64> = conn
        .query_row(
            "SELECT id FROM messages WHERE fingerprint = ?1",
            [fingerprint],
            |row| row.get(0),
        )
        .optional()?;
    if by_fingerprint.is_some() {
        return Ok(true);
    }

    if let (Some(sender_id), Some(content)) = (&record.sender_id, &record.content_text) {
        let near: Option<i64> = conn
            .query_row(
                "SELECT id FROM messages
                 WHERE sender_id = ?1
                   AND timestamp > ?2 AND timestamp < ?3
                   AND content_text = ?4",
                params![
                    sender_id,
                    record.timestamp - NEAR_DUPLICATE_WINDOW_MS,
                    record.timestamp + NEAR_DUPLICATE_WINDOW_MS,
                    content
                ],
                |row| row.get(0),
            )
            .optional()?;
        if near.is_some() {
            return Ok(true);
        }
    }

    Ok(false)
}

pub fn insert(
    conn: &Connection,
    record: &MessageRecord,
    skip_if_exists: bool,
    now: i64,
) -> Result<Option<i64>> {
    let fingerprint = fingerprint_for(record);

    if skip_if_exists && is_duplicate(conn, record, &fingerprint)? {
        return Ok(None);
    }

    conn.execute(
        r#"
        INSERT INTO messages (
            message_id, internal_id, session_key, session_id, direction,
            sender_id, sender_name, recipient_id, recipient_name, channel,
            device_id, content_type, content_text, raw_json, fingerprint,
            reply_to_id, thread_id, timestamp, edited_at, deleted_at, ingested_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21)
        "#,
        params![
            &record.message_id,
            &record.internal_id,
            &record.session_key,
            &record.session_id,
            record.direction.as_str(),
            &record.sender_id,
            &record.sender_name,
            &record.recipient_id,
            &record.recipient_name,
            &record.channel,
            &record.device_id,
            record.content_type.as_str(),
            &record.content_text,
            record.raw.to_string(),
            &fingerprint,
            &record.reply_to_id,
            &record.thread_id,
            record.timestamp,
            record.edited_at,
            record.deleted_at,
            now,
        ],
    )?;

    Ok(Some(conn.last_insert_rowid()))
}

/// Upsert a reaction. Re-adding after removal clears `removed_at` and
/// refreshes `added_at`, keeping at most one active reaction per
/// (message, emoji, user).
pub fn add_reaction(
    conn: &Connection,
    message_id: &str,
    emoji: &str,
    user_id: &str,
    user_name: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO reactions (message_id, emoji, user_id, user_name, added_at, removed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, NULL)
        ON CONFLICT(message_id, emoji, user_id) DO UPDATE SET
            user_name = COALESCE(?4, user_name),
            added_at = ?5,
            removed_at = NULL
        "#,
        params![message_id, emoji, user_id, user_name, now],
    )?;
    Ok(())
}

/// Mark a reaction removed. Returns false when no active reaction exists.
pub fn remove_reaction(
    conn: &Connection,
    message_id: &str,
    emoji: &str,
    user_id: &str,
    now: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE reactions SET removed_at = ?1
         WHERE message_id = ?2 AND emoji = ?3 AND user_id = ?4 AND removed_at IS NULL",
        params![now, message_id, emoji, user_id],
    )?;
    Ok(changed > 0)
}

/// Append an Edit row holding the previous content, then rewrite the live
/// message. Must run inside a transaction. Silent no-op when the message
/// is absent.
pub fn update(
    conn: &Connection,
    message_id: &str,
    new_content: &str,
    edited_at: i64,
) -> Result<bool> {
    let previous: Option<Option<String>> = conn
        .query_row(
            "SELECT content_text FROM messages WHERE message_id = ?1",
            [message_id],
            |row| row.get(0),
        )
        .optional()?;

    let previous = match previous {
        Some(content) => content,
        None => return Ok(false),
    };

    conn.execute(
        "INSERT INTO edits (message_id, previous_content, edited_at) VALUES (?1, ?2, ?3)",
        params![message_id, previous, edited_at],
    )?;
    conn.execute(
        "UPDATE messages SET content_text = ?1, edited_at = ?2 WHERE message_id = ?3",
        params![new_content, edited_at, message_id],
    )?;

    Ok(true)
}

/// Soft delete: the row stays, `deleted_at` hides it from default queries.
pub fn soft_delete(conn: &Connection, message_id: &str, when: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE messages SET deleted_at = ?1 WHERE message_id = ?2",
        params![when, message_id],
    )?;
    Ok(changed > 0)
}

pub fn query(conn: &Connection, filter: &MessageFilter) -> Result<Vec<StoredMessage>> {
    let mut sql = format!("SELECT {} FROM messages m", MESSAGE_COLUMNS);
    let mut conditions: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(content_match) = &filter.content_match {
        sql.push_str(" JOIN messages_fts f ON f.rowid = m.id");
        conditions.push("f.messages_fts MATCH ?");
        args.push(Box::new(content_match.clone()));
    }
    if let Some(session_key) = &filter.session_key {
        conditions.push("m.session_key = ?");
        args.push(Box::new(session_key.clone()));
    }
    if let Some(channel) = &filter.channel {
        conditions.push("m.channel = ?");
        args.push(Box::new(channel.clone()));
    }
    if let Some(sender_id) = &filter.sender_id {
        conditions.push("m.sender_id = ?");
        args.push(Box::new(sender_id.clone()));
    }
    if let Some(since) = filter.since {
        conditions.push("m.timestamp >= ?");
        args.push(Box::new(since));
    }
    if let Some(until) = filter.until {
        conditions.push("m.timestamp <= ?");
        args.push(Box::new(until));
    }
    if !filter.include_deleted {
        conditions.push("m.deleted_at IS NULL");
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY m.timestamp DESC LIMIT ? OFFSET ?");
    args.push(Box::new(filter.limit.map(|l| l as i64).unwrap_or(-1)));
    args.push(Box::new(filter.offset.map(|o| o as i64).unwrap_or(0)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            map_message_row,
        )?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(rows)
}

/// Ranked full-text search over live (non-deleted) messages.
pub fn search(conn: &Connection, query: &str, limit: usize) -> Result<Vec<StoredMessage>> {
    let sql = format!(
        "SELECT {} FROM messages m
         JOIN messages_fts f ON f.rowid = m.id
         WHERE f.messages_fts MATCH ?1 AND m.deleted_at IS NULL
         ORDER BY f.rank LIMIT ?2",
        MESSAGE_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![query, limit as i64], map_message_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(rows)
}

/// Human-readable transcript for a time window, oldest first. Used as LLM
/// input, so the format stays plain and line-oriented.
pub fn conversation_context(
    conn: &Connection,
    start: i64,
    end: i64,
    session_key: Option<&str>,
) -> Result<String> {
    let filter = MessageFilter {
        session_key: session_key.map(str::to_string),
        since: Some(start),
        until: Some(end),
        ..Default::default()
    };

    let mut messages = query(conn, &filter)?;
    messages.reverse();

    let mut transcript = String::new();
    for stored in &messages {
        let record = &stored.record;
        let sender = record
            .sender_name
            .as_deref()
            .or(record.sender_id.as_deref())
            .unwrap_or("unknown");
        let text = record.content_text.as_deref().unwrap_or("");
        transcript.push_str(&format!(
            "[{}] {}: {}\n",
            format_iso_millis(record.timestamp),
            sender,
            text
        ));
    }

    Ok(transcript)
}

pub fn add_attachment(conn: &Connection, attachment: &AttachmentRecord) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO attachments (
            message_id, attachment_type, file_path, url, file_name,
            size_bytes, mime_type, thumbnail_path, metadata, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            &attachment.message_id,
            &attachment.attachment_type,
            &attachment.file_path,
            &attachment.url,
            &attachment.file_name,
            attachment.size_bytes,
            &attachment.mime_type,
            &attachment.thumbnail_path,
            attachment.metadata.as_ref().map(|m| m.to_string()),
            attachment.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn attachments_for(conn: &Connection, message_id: &str) -> Result<Vec<AttachmentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT message_id, attachment_type, file_path, url, file_name,
                size_bytes, mime_type, thumbnail_path, metadata, created_at
         FROM attachments WHERE message_id = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([message_id], |row| {
            let metadata: Option<String> = row.get(8)?;
            Ok(AttachmentRecord {
                message_id: row.get(0)?,
                attachment_type: row.get(1)?,
                file_path: row.get(2)?,
                url: row.get(3)?,
                file_name: row.get(4)?,
                size_bytes: row.get(5)?,
                mime_type: row.get(6)?,
                thumbnail_path: row.get(7)?,
                metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
                created_at: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(rows)
}

pub fn reactions_for(
    conn: &Connection,
    message_id: &str,
    active_only: bool,
) -> Result<Vec<ReactionRow>> {
    let mut sql = String::from(
        "SELECT emoji, user_id, user_name, added_at, removed_at
         FROM reactions WHERE message_id = ?1",
    );
    if active_only {
        sql.push_str(" AND removed_at IS NULL");
    }
    sql.push_str(" ORDER BY added_at");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([message_id], |row| {
            Ok(ReactionRow {
                emoji: row.get(0)?,
                user_id: row.get(1)?,
                user_name: row.get(2)?,
                added_at: row.get(3)?,
                removed_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(rows)
}

pub fn edits_for(conn: &Connection, message_id: &str) -> Result<Vec<EditRow>> {
    let mut stmt = conn.prepare(
        "SELECT previous_content, edited_at FROM edits
         WHERE message_id = ?1 ORDER BY edited_at, id",
    )?;

    let rows = stmt
        .query_map([message_id], |row| {
            Ok(EditRow {
                previous_content: row.get(0)?,
                edited_at: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    Ok(rows)
}

fn map_message_row(row: &Row) -> rusqlite::Result<StoredMessage> {
    let direction_text: String = row.get(5)?;
    let direction = Direction::parse(&direction_text)
        .ok_or_else(|| conversion_error(5, &direction_text))?;

    let content_type_text: String = row.get(12)?;
    let content_type = ContentType::parse(&content_type_text)
        .ok_or_else(|| conversion_error(12, &content_type_text))?;

    let raw_text: String = row.get(14)?;
    let raw: Value = serde_json::from_str(&raw_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e)))?;

    Ok(StoredMessage {
        row_id: row.get(0)?,
        record: MessageRecord {
            message_id: row.get(1)?,
            internal_id: row.get(2)?,
            session_key: row.get(3)?,
            session_id: row.get(4)?,
            direction,
            sender_id: row.get(6)?,
            sender_name: row.get(7)?,
            recipient_id: row.get(8)?,
            recipient_name: row.get(9)?,
            channel: row.get(10)?,
            device_id: row.get(11)?,
            content_type,
            content_text: row.get(13)?,
            raw,
            reply_to_id: row.get(16)?,
            thread_id: row.get(17)?,
            timestamp: row.get(18)?,
            edited_at: row.get(19)?,
            deleted_at: row.get(20)?,
        },
        fingerprint: row.get(15)?,
        ingested_at: row.get(21)?,
    })
}

fn conversion_error(index: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        format!("unrecognized tag: {}", value).into(),
    )
}
