use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Main,
    Subagent,
    Cron,
    Isolated,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Main => "main",
            SessionType::Subagent => "subagent",
            SessionType::Cron => "cron",
            SessionType::Isolated => "isolated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "main" => Some(SessionType::Main),
            "subagent" => Some(SessionType::Subagent),
            "cron" => Some(SessionType::Cron),
            "isolated" => Some(SessionType::Isolated),
            _ => None,
        }
    }

    /// Classify a session from its colon-joined session key.
    pub fn from_session_key(key: &str) -> Self {
        if key == "cron" || key.starts_with("cron:") {
            SessionType::Cron
        } else if key.ends_with(":subagent") {
            SessionType::Subagent
        } else {
            SessionType::Main
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// High-level summary row per session, keyed by the session identifier.
///
/// `message_count` and `event_count` are denormalized and eventually
/// consistent; refresh them through the store maintenance op rather than
/// trusting them for analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub id: String,
    pub session_key: Option<String>,
    pub session_type: SessionType,
    pub parent_session_id: Option<String>,
    pub label: Option<String>,
    pub agent_id: Option<String>,
    pub model: Option<String>,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub status: SessionStatus,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub message_count: i64,
    pub event_count: i64,
}

impl SessionData {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            session_key: None,
            session_type: SessionType::Main,
            parent_session_id: None,
            label: None,
            agent_id: None,
            model: None,
            started_at: None,
            ended_at: None,
            status: SessionStatus::Active,
            title: None,
            summary: None,
            message_count: 0,
            event_count: 0,
        }
    }
}

/// Session-level metadata derived from a parsed event stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub event_count: usize,
    pub has_thinking: bool,
    pub has_usage: bool,
    pub tool_call_count: usize,
    pub error_count: usize,
}
