use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message direction relative to the archive owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Direction::Inbound),
            "outbound" => Some(Direction::Outbound),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Document => "document",
            ContentType::Sticker => "sticker",
            ContentType::Location => "location",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ContentType::Text),
            "image" => Some(ContentType::Image),
            "video" => Some(ContentType::Video),
            "audio" => Some(ContentType::Audio),
            "document" => Some(ContentType::Document),
            "sticker" => Some(ContentType::Sticker),
            "location" => Some(ContentType::Location),
            _ => None,
        }
    }

    /// Map a MIME type to the closest content tag.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or("") {
            "image" => ContentType::Image,
            "video" => ContentType::Video,
            "audio" => ContentType::Audio,
            _ => ContentType::Document,
        }
    }
}

/// A point-in-time communication in a chat channel, native or imported.
///
/// `message_id` is the stable unique identifier; import parsers mint
/// deterministic, channel-prefixed values so repeat imports are idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    /// Sender-assigned id from the source system, when one exists.
    pub internal_id: Option<String>,
    pub session_key: String,
    pub session_id: Option<String>,
    pub direction: Direction,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub recipient_id: Option<String>,
    pub recipient_name: Option<String>,
    /// Free-form channel tag: `telegram`, `whatsapp`, `discord`, `agent`, ...
    pub channel: String,
    pub device_id: Option<String>,
    pub content_type: ContentType,
    pub content_text: Option<String>,
    /// Verbatim JSON copy of the source record.
    pub raw: Value,
    pub reply_to_id: Option<String>,
    pub thread_id: Option<String>,
    /// Event time, epoch milliseconds.
    pub timestamp: i64,
    pub edited_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

impl MessageRecord {
    pub fn new(
        message_id: impl Into<String>,
        session_key: impl Into<String>,
        channel: impl Into<String>,
        direction: Direction,
        timestamp: i64,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            internal_id: None,
            session_key: session_key.into(),
            session_id: None,
            direction,
            sender_id: None,
            sender_name: None,
            recipient_id: None,
            recipient_name: None,
            channel: channel.into(),
            device_id: None,
            content_type: ContentType::Text,
            content_text: None,
            raw: Value::Null,
            reply_to_id: None,
            thread_id: None,
            timestamp,
            edited_at: None,
            deleted_at: None,
        }
    }
}

/// Media owned by a message. One message may own many attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub message_id: String,
    pub attachment_type: String,
    pub file_path: Option<String>,
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub thumbnail_path: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: i64,
}
