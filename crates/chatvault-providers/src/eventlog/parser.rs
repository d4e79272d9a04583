use chatvault_types::util::parse_iso_millis;
use chatvault_types::{identity, ArchiveEvent, EventKind, SessionMetadata, ThinkingPayload, UsagePayload};
use serde_json::Value;
use tracing::warn;

use crate::eventlog::schema::{ContentBlock, LogRecord, MessageWire, UsageBody};

/// Lift one source record into archive events.
///
/// The first four record types map to a single event each. A `message`
/// record fans out: the parent event, then one `tool_call` per embedded
/// tool block, one `thinking_block`, and one `usage_stats`, all carrying
/// deterministic ids derived from the parent so re-parsing is idempotent.
///
/// Returns an empty vector for unknown types and for records whose
/// timestamp cannot be parsed.
pub(crate) fn normalize_record(record: LogRecord, raw: Value) -> Vec<ArchiveEvent> {
    match record {
        LogRecord::Session(header) => {
            let Some(timestamp) = timestamp_or_warn(&header.timestamp, &header.id) else {
                return Vec::new();
            };
            let mut event = ArchiveEvent::new(&header.id, EventKind::Session, timestamp, raw);
            // The root event names its own session.
            event.session_id = Some(header.id.clone());
            vec![event]
        }

        LogRecord::ModelChange(change) => {
            let Some(timestamp) = timestamp_or_warn(&change.timestamp, &change.id) else {
                return Vec::new();
            };
            let mut event = ArchiveEvent::new(&change.id, EventKind::ModelChange, timestamp, raw);
            event.parent_event_id = change.parent_id;
            event.provider = change.provider;
            event.model_id = change.model_id;
            vec![event]
        }

        LogRecord::ThinkingLevelChange(change) => {
            let Some(timestamp) = timestamp_or_warn(&change.timestamp, &change.id) else {
                return Vec::new();
            };
            let mut event =
                ArchiveEvent::new(&change.id, EventKind::ThinkingLevelChange, timestamp, raw);
            event.parent_event_id = change.parent_id;
            vec![event]
        }

        LogRecord::Custom(custom) => {
            let Some(timestamp) = timestamp_or_warn(&custom.timestamp, &custom.id) else {
                return Vec::new();
            };
            let mut event = ArchiveEvent::new(&custom.id, EventKind::Custom, timestamp, raw);
            event.parent_event_id = custom.parent_id;
            event.event_subtype = Some(custom.custom_type);
            vec![event]
        }

        LogRecord::Message(message) => normalize_message(message, raw),

        LogRecord::Unknown => Vec::new(),
    }
}

fn normalize_message(wire: MessageWire, raw: Value) -> Vec<ArchiveEvent> {
    let Some(timestamp) = timestamp_or_warn(&wire.timestamp, &wire.id) else {
        return Vec::new();
    };

    let role = wire.message.role.as_str();
    let kind = if role == "toolResult" {
        EventKind::ToolResult
    } else {
        EventKind::Message
    };

    let is_error = wire.message.content.iter().any(|block| {
        matches!(block, ContentBlock::ToolResult { is_error: true, .. })
    });

    let mut parent = ArchiveEvent::new(&wire.id, kind, timestamp, raw.clone());
    parent.parent_event_id = wire.parent_id.clone();
    parent.role = Some(wire.message.role.clone());
    parent.provider = wire.message.provider.clone();
    parent.model_id = wire.message.model.clone();
    parent.is_error = is_error;

    let mut events = vec![parent];

    // Only assistant messages carry tool calls, thinking and usage worth
    // splitting out; tool results and user messages stay single events.
    if role != "assistant" {
        return events;
    }

    let content_raw = raw
        .get("message")
        .and_then(|m| m.get("content"))
        .cloned()
        .unwrap_or(Value::Null);

    let mut thinking_emitted = false;
    for (idx, block) in wire.message.content.iter().enumerate() {
        let block_raw = content_raw.get(idx).cloned().unwrap_or(Value::Null);

        match block {
            ContentBlock::ToolCall { id, name, .. } => {
                let mut child = ArchiveEvent::new(
                    identity::tool_call_event_id(&wire.id, id),
                    EventKind::ToolCall,
                    timestamp,
                    block_raw,
                );
                child.parent_event_id = Some(wire.id.clone());
                child.role = Some(wire.message.role.clone());
                child.tool_name = Some(name.clone());
                events.push(child);
            }

            ContentBlock::Thinking {
                thinking,
                signature,
            } if !thinking_emitted => {
                thinking_emitted = true;
                let mut child = ArchiveEvent::new(
                    identity::thinking_event_id(&wire.id),
                    EventKind::ThinkingBlock,
                    timestamp,
                    block_raw,
                );
                child.parent_event_id = Some(wire.id.clone());
                child.role = Some(wire.message.role.clone());
                child.size_bytes = thinking.len() as i64;
                child.thinking = Some(ThinkingPayload {
                    content: thinking.clone(),
                    signature: signature.clone(),
                });
                events.push(child);
            }

            _ => {}
        }
    }

    if let Some(usage) = &wire.message.usage {
        let usage_raw = raw
            .get("message")
            .and_then(|m| m.get("usage"))
            .cloned()
            .unwrap_or(Value::Null);

        let mut child = ArchiveEvent::new(
            identity::usage_event_id(&wire.id),
            EventKind::UsageStats,
            timestamp,
            usage_raw,
        );
        child.parent_event_id = Some(wire.id.clone());
        child.provider = wire.message.provider.clone();
        child.model_id = wire.message.model.clone();
        child.usage = Some(usage_payload(usage));
        events.push(child);
    }

    events
}

fn usage_payload(usage: &UsageBody) -> UsagePayload {
    let cost = usage.cost.clone().unwrap_or_default();
    let total_tokens = if usage.total_tokens > 0 {
        usage.total_tokens
    } else {
        usage.input + usage.output + usage.cache_read + usage.cache_write
    };
    UsagePayload {
        input_tokens: usage.input,
        output_tokens: usage.output,
        cache_read_tokens: usage.cache_read,
        cache_write_tokens: usage.cache_write,
        total_tokens,
        input_cost: cost.input,
        output_cost: cost.output,
        cache_read_cost: cost.cache_read,
        cache_write_cost: cost.cache_write,
        total_cost: cost.total,
    }
}

fn timestamp_or_warn(timestamp: &str, record_id: &str) -> Option<i64> {
    let parsed = parse_iso_millis(timestamp);
    if parsed.is_none() {
        warn!(record_id, timestamp, "dropping record with unparseable timestamp");
    }
    parsed
}

/// Derive session-level metadata from an accumulated event stream.
pub fn session_metadata(events: &[ArchiveEvent]) -> SessionMetadata {
    let mut meta = SessionMetadata::default();

    for event in events {
        meta.event_count += 1;
        meta.first_timestamp = Some(match meta.first_timestamp {
            Some(first) => first.min(event.timestamp),
            None => event.timestamp,
        });
        meta.last_timestamp = Some(match meta.last_timestamp {
            Some(last) => last.max(event.timestamp),
            None => event.timestamp,
        });

        match event.kind {
            EventKind::ThinkingBlock => meta.has_thinking = true,
            EventKind::UsageStats => meta.has_usage = true,
            EventKind::ToolCall => meta.tool_call_count += 1,
            _ => {}
        }
        if event.is_error {
            meta.error_count += 1;
        }
    }

    meta
}
