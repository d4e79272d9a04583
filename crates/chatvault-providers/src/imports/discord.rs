//! Discord JSON export parser (DiscordChatExporter layout).
//!
//! Direction follows `author.isBot`: the archive owner's bot account is
//! the outbound side of a Discord conversation.

use chatvault_types::util::parse_iso_millis;
use chatvault_types::{AttachmentRecord, ContentType, Direction, MessageRecord};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use crate::imports::{id_string, ImportedMessage};
use crate::{Error, Result};

pub const CHANNEL: &str = "discord";

#[derive(Debug, Deserialize)]
struct DiscordExport {
    channel: DiscordChannel,
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: Value,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: Value,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    content: String,
    author: DiscordAuthor,
    #[serde(default)]
    attachments: Vec<DiscordAttachment>,
    #[serde(default)]
    reference: Option<DiscordReference>,
}

#[derive(Debug, Deserialize)]
struct DiscordAuthor {
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "isBot")]
    is_bot: bool,
}

#[derive(Debug, Deserialize)]
struct DiscordAttachment {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "fileName")]
    file_name: Option<String>,
    #[serde(default, rename = "fileSizeBytes")]
    file_size_bytes: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DiscordReference {
    #[serde(default, rename = "messageId")]
    message_id: Option<Value>,
}

pub fn parse_file(path: &Path) -> Result<Vec<ImportedMessage>> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}

pub fn parse_str(text: &str) -> Result<Vec<ImportedMessage>> {
    let export: DiscordExport = serde_json::from_str(text)
        .map_err(|e| Error::Parse(format!("not a Discord export: {}", e)))?;

    let conversation_id = id_string(&export.channel.id).unwrap_or_else(|| "export".to_string());
    let session_key = format!("imported:{}:{}", CHANNEL, conversation_id);
    let channel_name = export.channel.name;

    let mut imported = Vec::new();
    for raw in export.messages {
        let message: DiscordMessage = match serde_json::from_value(raw.clone()) {
            Ok(m) => m,
            Err(err) => {
                warn!(error = %err, "skipping unreadable Discord record");
                continue;
            }
        };
        let Some(entry) = convert(message, raw, &conversation_id, &session_key, &channel_name)
        else {
            continue;
        };
        imported.push(entry);
    }

    Ok(imported)
}

fn convert(
    message: DiscordMessage,
    raw: Value,
    conversation_id: &str,
    session_key: &str,
    channel_name: &Option<String>,
) -> Option<ImportedMessage> {
    let source_id = id_string(&message.id)?;
    let timestamp = message.timestamp.as_deref().and_then(timestamp_millis)?;

    let direction = if message.author.is_bot {
        Direction::Outbound
    } else {
        Direction::Inbound
    };

    let content_type = message
        .attachments
        .first()
        .map(|a| attachment_content_type(a.file_name.as_deref()))
        .unwrap_or(ContentType::Text);

    let mut text = message.content.clone();
    if text.is_empty() {
        if let Some(first) = message.attachments.first() {
            text = format!(
                "[Attachment: {}]",
                first.file_name.as_deref().unwrap_or("file")
            );
        }
    }

    let message_id = format!("{}_{}_{}", CHANNEL, conversation_id, source_id);
    let mut record = MessageRecord::new(message_id.clone(), session_key, CHANNEL, direction, timestamp);
    record.internal_id = Some(source_id);
    record.sender_id = id_string(&message.author.id);
    record.sender_name = message.author.name.clone();
    record.recipient_name = channel_name.clone();
    record.thread_id = Some(conversation_id.to_string());
    record.content_type = content_type;
    record.content_text = if text.is_empty() { None } else { Some(text) };
    record.reply_to_id = message
        .reference
        .as_ref()
        .and_then(|r| r.message_id.as_ref())
        .and_then(id_string)
        .map(|reply| format!("{}_{}_{}", CHANNEL, conversation_id, reply));
    record.raw = raw;

    let mut entry = ImportedMessage::new(record);
    for attachment in &message.attachments {
        entry.attachments.push(AttachmentRecord {
            message_id: message_id.clone(),
            attachment_type: "attachment".to_string(),
            file_path: None,
            url: attachment.url.clone(),
            file_name: attachment.file_name.clone(),
            size_bytes: attachment.file_size_bytes,
            mime_type: None,
            thumbnail_path: None,
            metadata: None,
            created_at: timestamp,
        });
    }
    Some(entry)
}

fn timestamp_millis(timestamp: &str) -> Option<i64> {
    parse_iso_millis(timestamp).or_else(|| {
        // Some exports omit the offset entirely.
        NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|dt| dt.and_utc().timestamp_millis())
    })
}

fn attachment_content_type(file_name: Option<&str>) -> ContentType {
    let Some(name) = file_name else {
        return ContentType::Document;
    };
    let extension = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match extension.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => ContentType::Image,
        "mp4" | "mov" | "webm" | "mkv" | "avi" => ContentType::Video,
        "mp3" | "ogg" | "wav" | "flac" | "m4a" => ContentType::Audio,
        _ => ContentType::Document,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_export() -> String {
        json!({
            "guild": {"id": "1", "name": "Test Server"},
            "channel": {"id": "900", "name": "general"},
            "messages": [
                {
                    "id": "111",
                    "type": "Default",
                    "timestamp": "2023-12-31T22:30:00.000+00:00",
                    "content": "hello from a human",
                    "author": {"id": "u1", "name": "alice", "isBot": false},
                    "attachments": []
                },
                {
                    "id": "112",
                    "type": "Default",
                    "timestamp": "2023-12-31T22:31:00.000+00:00",
                    "content": "beep boop",
                    "author": {"id": "b1", "name": "archivist", "isBot": true},
                    "attachments": [],
                    "reference": {"messageId": "111"}
                },
                {
                    "id": "113",
                    "type": "Default",
                    "timestamp": "2023-12-31T22:32:00.000+00:00",
                    "content": "",
                    "author": {"id": "u1", "name": "alice", "isBot": false},
                    "attachments": [
                        {"id": "a1", "url": "https://cdn.example/x.png",
                         "fileName": "x.png", "fileSizeBytes": 2048}
                    ]
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_parse_basic_export() {
        let messages = parse_str(&sample_export()).unwrap();
        assert_eq!(messages.len(), 3);

        let human = &messages[0].record;
        assert_eq!(human.message_id, "discord_900_111");
        assert_eq!(human.session_key, "imported:discord:900");
        assert_eq!(human.direction, Direction::Inbound);
        assert_eq!(human.timestamp, 1704061800000);
    }

    #[test]
    fn test_bot_author_is_outbound() {
        let messages = parse_str(&sample_export()).unwrap();
        let bot = &messages[1].record;
        assert_eq!(bot.direction, Direction::Outbound);
        assert_eq!(bot.reply_to_id.as_deref(), Some("discord_900_111"));
    }

    #[test]
    fn test_attachment_only_message() {
        let messages = parse_str(&sample_export()).unwrap();
        let attachment_message = &messages[2];
        assert_eq!(attachment_message.record.content_type, ContentType::Image);
        assert_eq!(
            attachment_message.record.content_text.as_deref(),
            Some("[Attachment: x.png]")
        );
        assert_eq!(attachment_message.attachments.len(), 1);
        assert_eq!(attachment_message.attachments[0].size_bytes, Some(2048));
    }

    #[test]
    fn test_invalid_top_level_is_fatal() {
        assert!(parse_str("{\"messages\": \"nope\"}").is_err());
    }
}
