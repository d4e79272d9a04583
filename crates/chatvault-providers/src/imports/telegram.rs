//! Telegram Desktop JSON export parser.
//!
//! The export is one object with chat metadata and a `messages` array.
//! Text bodies are either plain strings or arrays of formatted runs; runs
//! are concatenated into one plain-text body.

use chatvault_types::{
    AttachmentRecord, ContentType, Direction, MessageRecord,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use crate::imports::{id_string, ImportedMessage};
use crate::{Error, Result};

pub const CHANNEL: &str = "telegram";

#[derive(Debug, Deserialize)]
struct TelegramExport {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    id: Value,
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_unixtime: Option<Value>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    from_id: Option<String>,
    #[serde(default)]
    text: Value,
    #[serde(default)]
    photo: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    sticker_emoji: Option<String>,
    #[serde(default)]
    reply_to_message_id: Option<i64>,
    #[serde(default)]
    location_information: Option<Value>,
}

pub fn parse_file(path: &Path) -> Result<Vec<ImportedMessage>> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}

pub fn parse_str(text: &str) -> Result<Vec<ImportedMessage>> {
    let export: TelegramExport = serde_json::from_str(text)
        .map_err(|e| Error::Parse(format!("not a Telegram export: {}", e)))?;

    let conversation_id = export
        .id
        .as_ref()
        .and_then(id_string)
        .unwrap_or_else(|| "export".to_string());
    let session_key = format!("imported:{}:{}", CHANNEL, conversation_id);
    let chat_name = export.name;

    let mut imported = Vec::new();
    for raw in export.messages {
        let message: TelegramMessage = match serde_json::from_value(raw.clone()) {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, "skipping unreadable Telegram record");
                continue;
            }
        };
        // Service records (joins, pins, calls) are not messages.
        if message.message_type != "message" {
            continue;
        }
        let Some(entry) = convert(message, raw, &conversation_id, &session_key, &chat_name) else {
            continue;
        };
        imported.push(entry);
    }

    Ok(imported)
}

fn convert(
    message: TelegramMessage,
    raw: Value,
    conversation_id: &str,
    session_key: &str,
    chat_name: &Option<String>,
) -> Option<ImportedMessage> {
    let source_id = id_string(&message.id)?;
    let timestamp = timestamp_millis(&message)?;

    let outbound = message.from_id.as_deref() == Some("user_self")
        || message.from.as_deref() == Some("You");
    let direction = if outbound {
        Direction::Outbound
    } else {
        Direction::Inbound
    };

    let mut text = flatten_text(&message.text);
    let (content_type, attachment) = classify_media(&message, timestamp);
    if text.is_empty() {
        text = media_placeholder(content_type, &message);
    }

    let message_id = format!("{}_{}_{}", CHANNEL, conversation_id, source_id);
    let mut record = MessageRecord::new(message_id.clone(), session_key, CHANNEL, direction, timestamp);
    record.internal_id = Some(source_id);
    record.sender_id = message.from_id.clone();
    record.sender_name = message.from.clone();
    record.recipient_name = chat_name.clone();
    record.content_type = content_type;
    record.content_text = if text.is_empty() { None } else { Some(text) };
    record.reply_to_id = message
        .reply_to_message_id
        .map(|reply| format!("{}_{}_{}", CHANNEL, conversation_id, reply));
    record.raw = raw;

    let mut entry = ImportedMessage::new(record);
    if let Some(mut attachment) = attachment {
        attachment.message_id = message_id;
        entry.attachments.push(attachment);
    }
    Some(entry)
}

fn timestamp_millis(message: &TelegramMessage) -> Option<i64> {
    if let Some(unixtime) = &message.date_unixtime {
        let seconds = match unixtime {
            Value::String(s) => s.parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        if let Some(seconds) = seconds {
            return Some(seconds * 1000);
        }
    }
    // Telegram `date` is local time without offset; treated as UTC.
    let date = message.date.as_deref()?;
    NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Concatenate formatted-text runs into one plain string.
fn flatten_text(text: &Value) -> String {
    match text {
        Value::String(s) => s.clone(),
        Value::Array(runs) => runs
            .iter()
            .map(|run| match run {
                Value::String(s) => s.as_str(),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str).unwrap_or(""),
                _ => "",
            })
            .collect(),
        _ => String::new(),
    }
}

fn classify_media(
    message: &TelegramMessage,
    timestamp: i64,
) -> (ContentType, Option<AttachmentRecord>) {
    let attachment_from = |attachment_type: &str, file_path: Option<&String>| AttachmentRecord {
        message_id: String::new(),
        attachment_type: attachment_type.to_string(),
        file_path: file_path.cloned(),
        url: None,
        file_name: message.file_name.clone(),
        size_bytes: None,
        mime_type: message.mime_type.clone(),
        thumbnail_path: None,
        metadata: None,
        created_at: timestamp,
    };

    if message.location_information.is_some() {
        return (ContentType::Location, None);
    }
    if let Some(media_type) = message.media_type.as_deref() {
        let content_type = match media_type {
            "sticker" => ContentType::Sticker,
            "voice_message" | "audio_file" => ContentType::Audio,
            "video_file" | "video_message" | "animation" => ContentType::Video,
            _ => ContentType::Document,
        };
        return (content_type, Some(attachment_from(media_type, message.file.as_ref())));
    }
    if message.photo.is_some() {
        return (
            ContentType::Image,
            Some(attachment_from("photo", message.photo.as_ref())),
        );
    }
    if message.file.is_some() {
        let content_type = message
            .mime_type
            .as_deref()
            .map(ContentType::from_mime)
            .unwrap_or(ContentType::Document);
        return (content_type, Some(attachment_from("file", message.file.as_ref())));
    }
    (ContentType::Text, None)
}

fn media_placeholder(content_type: ContentType, message: &TelegramMessage) -> String {
    match content_type {
        ContentType::Image => "[Photo]".to_string(),
        ContentType::Video => "[Video]".to_string(),
        ContentType::Audio => "[Audio]".to_string(),
        ContentType::Sticker => message
            .sticker_emoji
            .clone()
            .unwrap_or_else(|| "[Sticker]".to_string()),
        ContentType::Location => "[Location]".to_string(),
        ContentType::Document => "[File]".to_string(),
        ContentType::Text => String::new(),
    }
}
