use chatvault_types::util::truncate;
use chatvault_types::{ArchiveEvent, EventKind, SessionData};
use serde_json::Value;

/// Title and short summary for one session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub title: String,
    pub summary: String,
}

/// Strategy seam for session labeling.
///
/// The AI-backed implementation lives outside the core; the scanner only
/// requires that some summarizer exists and falls back to
/// [`LocalSummarizer`] when a call fails.
pub trait Summarizer {
    fn summarize(&self, session: &SessionData, events: &[ArchiveEvent])
        -> anyhow::Result<SessionSummary>;
}

/// Deterministic, offline summarizer. Always succeeds.
#[derive(Debug, Default)]
pub struct LocalSummarizer;

impl Summarizer for LocalSummarizer {
    fn summarize(
        &self,
        session: &SessionData,
        events: &[ArchiveEvent],
    ) -> anyhow::Result<SessionSummary> {
        Ok(local_summary(session, events))
    }
}

/// Build the fallback title and summary from event aggregates alone.
pub fn local_summary(session: &SessionData, events: &[ArchiveEvent]) -> SessionSummary {
    let title = first_user_text(events)
        .map(|text| truncate(text.trim(), 60))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            format!(
                "{} session {}",
                session.session_type.as_str(),
                truncate(&session.id, 8)
            )
        });

    let message_count = events
        .iter()
        .filter(|e| e.kind == EventKind::Message)
        .count();
    let tool_call_count = events
        .iter()
        .filter(|e| e.kind == EventKind::ToolCall)
        .count();
    let error_count = events.iter().filter(|e| e.is_error).count();

    let duration_minutes = match (
        events.first().map(|e| e.timestamp),
        events.last().map(|e| e.timestamp),
    ) {
        (Some(first), Some(last)) if last > first => (last - first) / 60_000,
        _ => 0,
    };

    let mut summary = format!(
        "Session with {} events and {} messages over {} minutes.",
        events.len(),
        message_count,
        duration_minutes
    );
    summary.push_str(&format!(" The agent made {} tool calls", tool_call_count));
    if error_count > 0 {
        summary.push_str(&format!(", {} of which failed.", error_count));
    } else {
        summary.push_str(" without errors.");
    }

    SessionSummary { title, summary }
}

fn first_user_text(events: &[ArchiveEvent]) -> Option<&str> {
    events
        .iter()
        .find(|e| e.kind == EventKind::Message && e.role.as_deref() == Some("user"))
        .and_then(|e| message_text(&e.raw))
}

/// Pull the first plain-text body out of a message record's raw JSON.
fn message_text(raw: &Value) -> Option<&str> {
    let content = raw.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.as_str()),
        Value::Array(blocks) => blocks.iter().find_map(|block| {
            if block.get("type").and_then(Value::as_str) == Some("text") {
                block.get("text").and_then(Value::as_str)
            } else {
                None
            }
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_message(id: &str, timestamp: i64, text: &str) -> ArchiveEvent {
        let raw = json!({
            "type": "message", "id": id,
            "message": {"role": "user", "content": text}
        });
        let mut event = ArchiveEvent::new(id, EventKind::Message, timestamp, raw);
        event.role = Some("user".to_string());
        event
    }

    #[test]
    fn test_title_from_first_user_message() {
        let session = SessionData::new("S1");
        let events = vec![user_message("U1", 0, "Refactor the billing module")];
        let summary = local_summary(&session, &events);
        assert_eq!(summary.title, "Refactor the billing module");
    }

    #[test]
    fn test_title_falls_back_to_session_id() {
        let session = SessionData::new("0f93ab12-4cd5");
        let summary = local_summary(&session, &[]);
        assert!(summary.title.contains("0f93ab12"));
    }

    #[test]
    fn test_summary_is_deterministic() {
        let session = SessionData::new("S1");
        let events = vec![
            user_message("U1", 0, "hi"),
            user_message("U2", 120_000, "still there?"),
        ];
        let a = local_summary(&session, &events);
        let b = local_summary(&session, &events);
        assert_eq!(a.summary, b.summary);
        assert!(a.summary.contains("2 events"));
        assert!(a.summary.contains("2 minutes"));
    }
}
