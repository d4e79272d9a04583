use chatvault_types::util::now_millis;
use chatvault_types::{ArchiveEvent, AttachmentRecord, EventKind, MessageRecord, SessionData};
use rusqlite::Connection;
use std::path::Path;

use crate::queries::{events, messages, sessions, state};
use crate::records::{
    BackfillEntry, BatchOutcome, EditRow, EventFilter, MessageFilter, ReactionRow,
    SessionFilter, SessionListEntry, SessionStats, StoredMessage,
};
use crate::{schema, Error, Result};

/// Handle to the embedded archive file.
///
/// One process owns the file; concurrent readers are served through WAL
/// while this handle serializes all mutations. Methods that touch more
/// than one row run inside a transaction.
pub struct Archive {
    conn: Connection,
}

impl Archive {
    /// Open (creating if needed) the archive at `path`. Parent directories
    /// are created; WAL and foreign-key enforcement are switched on before
    /// the schema runs.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    // --- messages ---

    /// Insert one message. Returns `None` when the three-stage duplicate
    /// check rejects the record.
    pub fn insert_message(
        &self,
        record: &MessageRecord,
        skip_if_exists: bool,
    ) -> Result<Option<i64>> {
        messages::insert(&self.conn, record, skip_if_exists, now_millis())
    }

    /// Insert many messages in one transaction. Duplicates count as
    /// skipped, never as errors.
    pub fn insert_messages_batch(&mut self, records: &[MessageRecord]) -> Result<BatchOutcome> {
        let now = now_millis();
        let tx = self.conn.transaction()?;
        let mut outcome = BatchOutcome::default();

        for record in records {
            match messages::insert(&tx, record, true, now) {
                Ok(Some(_)) => outcome.inserted += 1,
                Ok(None) => outcome.skipped += 1,
                Err(Error::Database(db_err)) => match events::classify_constraint(&db_err) {
                    Some(events::InsertFailure::Duplicate) => outcome.skipped += 1,
                    Some(events::InsertFailure::Referential) => outcome.errors += 1,
                    None => return Err(Error::Database(db_err)),
                },
                Err(other) => return Err(other),
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    pub fn add_reaction(
        &self,
        message_id: &str,
        emoji: &str,
        user_id: &str,
        user_name: Option<&str>,
    ) -> Result<()> {
        messages::add_reaction(&self.conn, message_id, emoji, user_id, user_name, now_millis())
    }

    pub fn remove_reaction(&self, message_id: &str, emoji: &str, user_id: &str) -> Result<bool> {
        messages::remove_reaction(&self.conn, message_id, emoji, user_id, now_millis())
    }

    /// Atomically append an edit record and rewrite the live content.
    /// Silent no-op (returns false) when the message does not exist.
    pub fn update_message(
        &mut self,
        message_id: &str,
        new_content: &str,
        edited_at: i64,
    ) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let updated = messages::update(&tx, message_id, new_content, edited_at)?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn soft_delete_message(&self, message_id: &str, when: i64) -> Result<bool> {
        messages::soft_delete(&self.conn, message_id, when)
    }

    pub fn query_messages(&self, filter: &MessageFilter) -> Result<Vec<StoredMessage>> {
        messages::query(&self.conn, filter)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        messages::search(&self.conn, query, limit)
    }

    pub fn conversation_context(
        &self,
        start: i64,
        end: i64,
        session_key: Option<&str>,
    ) -> Result<String> {
        messages::conversation_context(&self.conn, start, end, session_key)
    }

    pub fn add_attachment(&self, attachment: &AttachmentRecord) -> Result<i64> {
        messages::add_attachment(&self.conn, attachment)
    }

    pub fn message_attachments(&self, message_id: &str) -> Result<Vec<AttachmentRecord>> {
        messages::attachments_for(&self.conn, message_id)
    }

    pub fn message_reactions(&self, message_id: &str, active_only: bool) -> Result<Vec<ReactionRow>> {
        messages::reactions_for(&self.conn, message_id, active_only)
    }

    pub fn message_edits(&self, message_id: &str) -> Result<Vec<EditRow>> {
        messages::edits_for(&self.conn, message_id)
    }

    // --- events ---

    /// Insert one archive event (plus satellite row for thinking/usage
    /// payloads). Returns `None` when the event id already exists and
    /// `skip_if_exists` is set.
    pub fn insert_event(
        &self,
        event: &ArchiveEvent,
        session_key: &str,
        skip_if_exists: bool,
    ) -> Result<Option<i64>> {
        if skip_if_exists && events::exists(&self.conn, &event.event_id)? {
            return Ok(None);
        }
        let mut event = event.clone();
        if event.session_key.is_none() {
            event.session_key = Some(session_key.to_string());
        }
        events::insert(&self.conn, &event, now_millis()).map(Some)
    }

    /// Insert a batch of events in one transaction, in supplied order.
    ///
    /// When `session_id` is not given it is taken from the first `session`
    /// event in the batch, and back-filled onto any event the parser left
    /// unset. `suspend_fk` turns referential checking off for this batch
    /// only, which is what lets forced historical backfills insert children
    /// whose parents are not yet known.
    pub fn insert_events_batch(
        &mut self,
        events_in: &[ArchiveEvent],
        session_key: &str,
        session_id: Option<&str>,
        suspend_fk: bool,
    ) -> Result<BatchOutcome> {
        if suspend_fk {
            self.conn.pragma_update(None, "foreign_keys", false)?;
        }
        let result = self.insert_events_batch_inner(events_in, session_key, session_id);
        if suspend_fk {
            // Restore enforcement even when the batch failed.
            self.conn.pragma_update(None, "foreign_keys", true)?;
        }
        result
    }

    fn insert_events_batch_inner(
        &mut self,
        events_in: &[ArchiveEvent],
        session_key: &str,
        session_id: Option<&str>,
    ) -> Result<BatchOutcome> {
        let derived_session_id: Option<String> = session_id.map(str::to_string).or_else(|| {
            events_in
                .iter()
                .find(|e| e.kind == EventKind::Session)
                .map(|e| e.event_id.clone())
        });

        let now = now_millis();
        let tx = self.conn.transaction()?;
        let mut outcome = BatchOutcome::default();

        for event in events_in {
            let mut event = event.clone();
            if event.session_key.is_none() {
                event.session_key = Some(session_key.to_string());
            }
            if event.session_id.is_none() {
                event.session_id = derived_session_id.clone();
            }

            if events::exists(&tx, &event.event_id)? {
                outcome.skipped += 1;
                continue;
            }

            match events::insert(&tx, &event, now) {
                Ok(_) => outcome.inserted += 1,
                Err(Error::Database(db_err)) => match events::classify_constraint(&db_err) {
                    Some(events::InsertFailure::Duplicate) => outcome.skipped += 1,
                    Some(events::InsertFailure::Referential) => outcome.errors += 1,
                    None => return Err(Error::Database(db_err)),
                },
                Err(other) => return Err(other),
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    pub fn session_events(
        &self,
        session_id: &str,
        filter: &EventFilter,
    ) -> Result<Vec<ArchiveEvent>> {
        events::session_events(&self.conn, session_id, filter)
    }

    pub fn session_stats(&self, session_id: &str) -> Result<SessionStats> {
        events::session_stats(&self.conn, session_id)
    }

    pub fn export_session_jsonl(&self, session_id: &str) -> Result<String> {
        events::export_session_jsonl(&self.conn, session_id)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionListEntry>> {
        events::list_sessions(&self.conn)
    }

    // --- sessions ---

    /// Insert-or-update a session row. Returns true when inserted.
    pub fn upsert_session(&self, session: &SessionData) -> Result<bool> {
        sessions::upsert(&self.conn, session, now_millis())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionData>> {
        sessions::get_by_id(&self.conn, session_id)
    }

    pub fn query_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionData>> {
        sessions::query(&self.conn, filter)
    }

    pub fn search_sessions(&self, query: &str, limit: usize) -> Result<Vec<SessionData>> {
        sessions::search(&self.conn, query, limit)
    }

    pub fn find_session_by_prefix(&self, prefix: &str) -> Result<Option<String>> {
        sessions::find_by_prefix(&self.conn, prefix)
    }

    pub fn refresh_session_counts(&self, session_id: &str) -> Result<()> {
        sessions::refresh_counts(&self.conn, session_id, now_millis())
    }

    // --- scanner state ---

    pub fn checkpoint(&self, key: &str) -> Result<Option<String>> {
        state::get(&self.conn, key)
    }

    pub fn set_checkpoint(&self, key: &str, value: &str) -> Result<()> {
        state::set(&self.conn, key, value, now_millis())
    }

    pub fn watermark(&self, key: &str) -> Result<i64> {
        state::watermark(&self.conn, key)
    }

    pub fn list_checkpoints(&self) -> Result<Vec<(String, String, i64)>> {
        state::list(&self.conn)
    }

    pub fn record_backfill(&self, entry: &BackfillEntry) -> Result<()> {
        state::record_backfill(&self.conn, entry)
    }

    // --- maintenance ---

    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute("VACUUM", [])?;
        Ok(())
    }
}
