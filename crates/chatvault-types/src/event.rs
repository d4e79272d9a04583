use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of archive event types.
///
/// The first five come straight from the event-log `type` discriminator.
/// The last three are synthesized from fields embedded inside a parent
/// `message` record and never appear on the wire themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Session,
    ModelChange,
    ThinkingLevelChange,
    Custom,
    Message,
    ToolCall,
    ToolResult,
    ThinkingBlock,
    UsageStats,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Session => "session",
            EventKind::ModelChange => "model_change",
            EventKind::ThinkingLevelChange => "thinking_level_change",
            EventKind::Custom => "custom",
            EventKind::Message => "message",
            EventKind::ToolCall => "tool_call",
            EventKind::ToolResult => "tool_result",
            EventKind::ThinkingBlock => "thinking_block",
            EventKind::UsageStats => "usage_stats",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session" => Some(EventKind::Session),
            "model_change" => Some(EventKind::ModelChange),
            "thinking_level_change" => Some(EventKind::ThinkingLevelChange),
            "custom" => Some(EventKind::Custom),
            "message" => Some(EventKind::Message),
            "tool_call" => Some(EventKind::ToolCall),
            "tool_result" => Some(EventKind::ToolResult),
            "thinking_block" => Some(EventKind::ThinkingBlock),
            "usage_stats" => Some(EventKind::UsageStats),
            _ => None,
        }
    }

    /// Synthetic events are derived from a parent `message` event and are
    /// omitted from session exports, which re-emit the parent instead.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            EventKind::ToolCall | EventKind::ThinkingBlock | EventKind::UsageStats
        )
    }
}

/// One row in the events table.
///
/// `session_key` and `session_id` are left unset by the parser for all but
/// the root `session` event; the scanner back-fills them before commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEvent {
    pub event_id: String,
    pub parent_event_id: Option<String>,
    pub session_key: Option<String>,
    pub session_id: Option<String>,
    pub kind: EventKind,
    /// Subtype string, populated for `custom` events.
    pub event_subtype: Option<String>,
    /// Event time, epoch milliseconds.
    pub timestamp: i64,
    /// Verbatim copy of the full logical source record.
    pub raw: Value,

    // Extracted columns for fast filtering.
    pub role: Option<String>,
    pub tool_name: Option<String>,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub is_error: bool,
    pub size_bytes: i64,

    /// Satellite payload, present iff `kind == ThinkingBlock`.
    pub thinking: Option<ThinkingPayload>,
    /// Satellite payload, present iff `kind == UsageStats`.
    pub usage: Option<UsagePayload>,
}

impl ArchiveEvent {
    /// Minimal constructor; extracted columns default to empty.
    pub fn new(event_id: impl Into<String>, kind: EventKind, timestamp: i64, raw: Value) -> Self {
        let raw_size = raw.to_string().len() as i64;
        Self {
            event_id: event_id.into(),
            parent_event_id: None,
            session_key: None,
            session_id: None,
            kind,
            event_subtype: None,
            timestamp,
            raw,
            role: None,
            tool_name: None,
            provider: None,
            model_id: None,
            is_error: false,
            size_bytes: raw_size,
            thinking: None,
            usage: None,
        }
    }
}

/// Thinking content factored out of the events table because the payloads
/// are large and rarely needed in listing paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingPayload {
    pub content: String,
    pub signature: Option<String>,
}

impl ThinkingPayload {
    pub fn content_size(&self) -> i64 {
        self.content.len() as i64
    }
}

/// Token and cost breakdown extracted from a message's usage object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsagePayload {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub total_tokens: i64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub cache_read_cost: f64,
    pub cache_write_cost: f64,
    pub total_cost: f64,
}
