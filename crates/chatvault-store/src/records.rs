use chatvault_types::{EventKind, MessageRecord, SessionStatus, SessionType};

/// A message row as read back from the archive.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub row_id: i64,
    pub record: MessageRecord,
    pub fingerprint: String,
    pub ingested_at: i64,
}

/// Counters returned by batch inserts.
///
/// Uniqueness conflicts land in `skipped` (normal under re-ingest);
/// constraint failures other than uniqueness land in `errors` and the
/// offending row is dropped while the batch continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Filters for `query_messages`. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub session_key: Option<String>,
    pub channel: Option<String>,
    pub sender_id: Option<String>,
    /// Inclusive lower bound, epoch milliseconds.
    pub since: Option<i64>,
    /// Inclusive upper bound, epoch milliseconds.
    pub until: Option<i64>,
    /// Full-text MATCH expression against message content.
    pub content_match: Option<String>,
    pub include_deleted: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Options for `session_events`.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub include_thinking: bool,
    pub include_usage: bool,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub types: Option<Vec<EventKind>>,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            include_thinking: true,
            include_usage: true,
            since: None,
            until: None,
            types: None,
        }
    }
}

/// Aggregate statistics for one session, computed from the events table.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub total_events: i64,
    pub message_count: i64,
    pub tool_call_count: i64,
    pub error_count: i64,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub duration_seconds: f64,
    pub total_size_bytes: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
}

/// One entry in the event-derived session listing.
#[derive(Debug, Clone)]
pub struct SessionListEntry {
    pub session_id: String,
    pub session_key: Option<String>,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub event_count: i64,
}

/// Filters for `query_sessions`.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub session_type: Option<SessionType>,
    pub status: Option<SessionStatus>,
    pub agent_id: Option<String>,
    pub since: Option<i64>,
    pub limit: Option<usize>,
}

/// An active or removed reaction on a message.
#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub emoji: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub added_at: i64,
    pub removed_at: Option<i64>,
}

/// One append-only edit record.
#[derive(Debug, Clone)]
pub struct EditRow {
    pub previous_content: Option<String>,
    pub edited_at: i64,
}

/// Audit record written after each bulk backfill.
#[derive(Debug, Clone)]
pub struct BackfillEntry {
    pub source: String,
    pub path: String,
    pub inserted: usize,
    pub skipped: usize,
    pub recorded_at: i64,
}
