//! WhatsApp text-export parser.
//!
//! Two line formats are tolerated:
//!   `12/31/23, 10:30 PM - Alice: message`        (US, month first)
//!   `[31/12/23, 22:31:00] Alice: message`        (bracketed, day first)
//! Lines that match neither prefix belong to the preceding message and are
//! joined with a newline. Exported timestamps carry no offset and are
//! treated as UTC.

use chatvault_types::{identity, ContentType, Direction, MessageRecord};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::json;
use std::path::Path;
use std::sync::OnceLock;

use crate::imports::ImportedMessage;
use crate::Result;

pub const CHANNEL: &str = "whatsapp";

const SESSION_KEY: &str = "imported:whatsapp:export";

fn us_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<month>\d{1,2})/(?P<day>\d{1,2})/(?P<year>\d{2,4}), (?P<hour>\d{1,2}):(?P<minute>\d{2})[\s\u{202f}\u{00a0}]?(?P<ampm>[AP]M) - (?P<sender>[^:]+): (?P<text>.*)$",
        )
        .expect("valid regex")
    })
}

fn bracket_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[(?P<day>\d{1,2})/(?P<month>\d{1,2})/(?P<year>\d{2,4}), (?P<hour>\d{1,2}):(?P<minute>\d{2}):(?P<second>\d{2})\] (?P<sender>[^:]+): (?P<text>.*)$",
        )
        .expect("valid regex")
    })
}

fn datetime_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\[?\d{1,2}/\d{1,2}/\d{2,4}, \d{1,2}:\d{2})").expect("valid regex")
    })
}

struct PendingMessage {
    sender: String,
    timestamp: i64,
    text: String,
}

pub fn parse_file(path: &Path) -> Result<Vec<ImportedMessage>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_str(&text))
}

pub fn parse_str(text: &str) -> Vec<ImportedMessage> {
    let mut messages = Vec::new();
    let mut pending: Option<PendingMessage> = None;

    for line in text.lines() {
        if let Some(parsed) = parse_line(line) {
            if let Some(done) = pending.take() {
                messages.push(finalize(done));
            }
            pending = Some(parsed);
        } else if datetime_prefix().is_match(line) {
            // Dated line without a sender: a system notice. Flush and skip.
            if let Some(done) = pending.take() {
                messages.push(finalize(done));
            }
        } else if let Some(current) = pending.as_mut() {
            current.text.push('\n');
            current.text.push_str(line);
        }
    }

    if let Some(done) = pending.take() {
        messages.push(finalize(done));
    }

    messages
}

fn parse_line(line: &str) -> Option<PendingMessage> {
    if let Some(captures) = us_line().captures(line) {
        let mut hour: u32 = captures["hour"].parse().ok()?;
        let ampm = &captures["ampm"];
        hour %= 12;
        if ampm == "PM" {
            hour += 12;
        }
        let timestamp = to_millis(
            &captures["year"],
            &captures["month"],
            &captures["day"],
            hour,
            captures["minute"].parse().ok()?,
            0,
        )?;
        return Some(PendingMessage {
            sender: captures["sender"].trim().to_string(),
            timestamp,
            text: captures["text"].to_string(),
        });
    }

    if let Some(captures) = bracket_line().captures(line) {
        let timestamp = to_millis(
            &captures["year"],
            &captures["month"],
            &captures["day"],
            captures["hour"].parse().ok()?,
            captures["minute"].parse().ok()?,
            captures["second"].parse().ok()?,
        )?;
        return Some(PendingMessage {
            sender: captures["sender"].trim().to_string(),
            timestamp,
            text: captures["text"].to_string(),
        });
    }

    None
}

fn to_millis(year: &str, month: &str, day: &str, hour: u32, minute: u32, second: u32) -> Option<i64> {
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;
    let datetime: NaiveDateTime = date.and_hms_opt(hour, minute, second)?;
    Some(datetime.and_utc().timestamp_millis())
}

fn finalize(pending: PendingMessage) -> ImportedMessage {
    let direction = if pending.sender == "You" {
        Direction::Outbound
    } else {
        Direction::Inbound
    };

    let (content_type, text) = classify_content(&pending.text);

    let message_id =
        identity::channel_message_id(CHANNEL, pending.timestamp, &pending.sender, &pending.text);

    let mut record = MessageRecord::new(message_id, SESSION_KEY, CHANNEL, direction, pending.timestamp);
    record.sender_id = Some(pending.sender.clone());
    record.sender_name = Some(pending.sender.clone());
    record.content_type = content_type;
    record.raw = json!({
        "sender": pending.sender,
        "timestamp": pending.timestamp,
        "text": pending.text,
    });
    record.content_text = Some(text);

    ImportedMessage::new(record)
}

/// Media is stripped from text exports; only a marker line remains.
fn classify_content(text: &str) -> (ContentType, String) {
    let marker = text.trim();
    let mapped = match marker {
        "<Media omitted>" => Some((ContentType::Document, "[Media]")),
        "image omitted" => Some((ContentType::Image, "[Image]")),
        "video omitted" => Some((ContentType::Video, "[Video]")),
        "GIF omitted" => Some((ContentType::Video, "[GIF]")),
        "audio omitted" => Some((ContentType::Audio, "[Audio]")),
        "sticker omitted" => Some((ContentType::Sticker, "[Sticker]")),
        "document omitted" => Some((ContentType::Document, "[Document]")),
        _ => None,
    };
    match mapped {
        Some((content_type, placeholder)) => (content_type, placeholder.to_string()),
        None => (ContentType::Text, text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_formats_parse() {
        let export = "12/31/23, 10:30 PM - Alice: Hi\n[31/12/23, 22:31:00] Bob: Hello\n";
        let messages = parse_str(export);
        assert_eq!(messages.len(), 2);

        let alice = &messages[0].record;
        assert_eq!(alice.sender_name.as_deref(), Some("Alice"));
        assert_eq!(alice.channel, "whatsapp");
        assert_eq!(alice.timestamp, 1704061800000);

        let bob = &messages[1].record;
        assert_eq!(bob.sender_name.as_deref(), Some("Bob"));
        assert_eq!(bob.timestamp, 1704061860000);

        // Monotonically increasing timestamps across formats.
        assert!(bob.timestamp > alice.timestamp);
    }

    #[test]
    fn test_continuation_lines_are_joined() {
        let export = "12/31/23, 10:30 PM - Alice: first line\nsecond line\nthird line\n12/31/23, 10:31 PM - Bob: next\n";
        let messages = parse_str(export);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].record.content_text.as_deref(),
            Some("first line\nsecond line\nthird line")
        );
    }

    #[test]
    fn test_you_is_outbound() {
        let export = "12/31/23, 10:30 PM - You: on my way\n";
        let messages = parse_str(export);
        assert_eq!(messages[0].record.direction, Direction::Outbound);
    }

    #[test]
    fn test_system_notice_is_skipped() {
        let export = "12/31/23, 10:29 PM - Messages are end-to-end encrypted\n12/31/23, 10:30 PM - Alice: hi\n";
        let messages = parse_str(export);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].record.sender_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_media_markers() {
        let export = "12/31/23, 10:30 PM - Alice: <Media omitted>\n12/31/23, 10:31 PM - Alice: image omitted\n";
        let messages = parse_str(export);
        assert_eq!(messages[0].record.content_text.as_deref(), Some("[Media]"));
        assert_eq!(messages[1].record.content_type, ContentType::Image);
    }

    #[test]
    fn test_repeat_parse_is_deterministic() {
        let export = "12/31/23, 10:30 PM - Alice: Hi\n";
        let first = parse_str(export);
        let second = parse_str(export);
        assert_eq!(first[0].record.message_id, second[0].record.message_id);
        assert!(first[0].record.message_id.starts_with("whatsapp_"));
    }
}
