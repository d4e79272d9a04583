use rusqlite::Connection;

use crate::Result;

// Schema version (increment when adding tables or columns)
pub const SCHEMA_VERSION: i32 = 3;

// Migrations are purely additive: every statement is IF NOT EXISTS, and a
// version bump never drops data. Soft-deleted messages keep their rows;
// `deleted_at` is the only tombstone.

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL UNIQUE,
            internal_id TEXT,
            session_key TEXT NOT NULL,
            session_id TEXT,
            direction TEXT NOT NULL,
            sender_id TEXT,
            sender_name TEXT,
            recipient_id TEXT,
            recipient_name TEXT,
            channel TEXT NOT NULL,
            device_id TEXT,
            content_type TEXT NOT NULL DEFAULT 'text',
            content_text TEXT,
            raw_json TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            reply_to_id TEXT,
            thread_id TEXT,
            timestamp INTEGER NOT NULL,
            edited_at INTEGER,
            deleted_at INTEGER,
            ingested_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_fingerprint ON messages(fingerprint);
        CREATE INDEX IF NOT EXISTS idx_messages_sender_ts ON messages(sender_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_messages_session_key ON messages(session_key);
        CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel);
        CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages(timestamp DESC);

        CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL,
            attachment_type TEXT NOT NULL,
            file_path TEXT,
            url TEXT,
            file_name TEXT,
            size_bytes INTEGER,
            mime_type TEXT,
            thumbnail_path TEXT,
            metadata TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (message_id) REFERENCES messages(message_id)
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_id);

        CREATE TABLE IF NOT EXISTS reactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL,
            emoji TEXT NOT NULL,
            user_id TEXT NOT NULL,
            user_name TEXT,
            added_at INTEGER NOT NULL,
            removed_at INTEGER,
            UNIQUE (message_id, emoji, user_id),
            FOREIGN KEY (message_id) REFERENCES messages(message_id)
        );

        CREATE TABLE IF NOT EXISTS edits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL,
            previous_content TEXT,
            edited_at INTEGER NOT NULL,
            FOREIGN KEY (message_id) REFERENCES messages(message_id)
        );

        CREATE INDEX IF NOT EXISTS idx_edits_message ON edits(message_id);

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL UNIQUE,
            parent_event_id TEXT REFERENCES events(event_id),
            session_key TEXT,
            session_id TEXT,
            event_type TEXT NOT NULL,
            event_subtype TEXT,
            timestamp INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL,
            raw_json TEXT NOT NULL,
            role TEXT,
            tool_name TEXT,
            provider TEXT,
            model_id TEXT,
            is_error INTEGER NOT NULL DEFAULT 0,
            size_bytes INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_events_parent ON events(parent_event_id);
        CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
        CREATE INDEX IF NOT EXISTS idx_events_ts ON events(timestamp);

        CREATE TABLE IF NOT EXISTS thinking_blocks (
            event_id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            signature TEXT,
            content_size INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (event_id) REFERENCES events(event_id)
        );

        CREATE TABLE IF NOT EXISTS usage_stats (
            event_id TEXT PRIMARY KEY,
            input_tokens INTEGER NOT NULL DEFAULT 0,
            output_tokens INTEGER NOT NULL DEFAULT 0,
            cache_read_tokens INTEGER NOT NULL DEFAULT 0,
            cache_write_tokens INTEGER NOT NULL DEFAULT 0,
            total_tokens INTEGER NOT NULL DEFAULT 0,
            input_cost REAL NOT NULL DEFAULT 0,
            output_cost REAL NOT NULL DEFAULT 0,
            cache_read_cost REAL NOT NULL DEFAULT 0,
            cache_write_cost REAL NOT NULL DEFAULT 0,
            total_cost REAL NOT NULL DEFAULT 0,
            provider TEXT,
            model_id TEXT,
            timestamp INTEGER NOT NULL,
            FOREIGN KEY (event_id) REFERENCES events(event_id)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            session_key TEXT,
            session_type TEXT NOT NULL DEFAULT 'main',
            parent_session_id TEXT,
            label TEXT,
            agent_id TEXT,
            model TEXT,
            started_at INTEGER,
            ended_at INTEGER,
            status TEXT NOT NULL DEFAULT 'active',
            title TEXT,
            summary TEXT,
            message_count INTEGER NOT NULL DEFAULT 0,
            event_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_key ON sessions(session_key);
        CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at DESC);

        CREATE TABLE IF NOT EXISTS scanner_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
            content_text,
            content='messages',
            content_rowid='id',
            tokenize='unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS messages_fts_ai AFTER INSERT ON messages BEGIN
            INSERT INTO messages_fts(rowid, content_text) VALUES (new.id, new.content_text);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_ad AFTER DELETE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content_text)
            VALUES ('delete', old.id, old.content_text);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_au AFTER UPDATE OF content_text ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content_text)
            VALUES ('delete', old.id, old.content_text);
            INSERT INTO messages_fts(rowid, content_text) VALUES (new.id, new.content_text);
        END;

        CREATE VIRTUAL TABLE IF NOT EXISTS sessions_fts USING fts5(
            title,
            summary,
            content='sessions',
            content_rowid='rowid',
            tokenize='unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS sessions_fts_ai AFTER INSERT ON sessions BEGIN
            INSERT INTO sessions_fts(rowid, title, summary)
            VALUES (new.rowid, new.title, new.summary);
        END;

        CREATE TRIGGER IF NOT EXISTS sessions_fts_ad AFTER DELETE ON sessions BEGIN
            INSERT INTO sessions_fts(sessions_fts, rowid, title, summary)
            VALUES ('delete', old.rowid, old.title, old.summary);
        END;

        CREATE TRIGGER IF NOT EXISTS sessions_fts_au AFTER UPDATE OF title, summary ON sessions BEGIN
            INSERT INTO sessions_fts(sessions_fts, rowid, title, summary)
            VALUES ('delete', old.rowid, old.title, old.summary);
            INSERT INTO sessions_fts(rowid, title, summary)
            VALUES (new.rowid, new.title, new.summary);
        END;
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}
