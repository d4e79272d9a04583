//! Session export rendering for operators.
//!
//! JSONL comes straight from the store (machine-facing reconstruction);
//! the remaining formats are derived views over the same rows.

use chatvault_store::SessionStats;
use chatvault_types::util::format_iso_millis;
use chatvault_types::{ArchiveEvent, SessionData};
use serde_json::json;

pub fn to_json(
    session: Option<&SessionData>,
    stats: &SessionStats,
    events: &[ArchiveEvent],
) -> String {
    let value = json!({
        "session": session,
        "stats": {
            "total_events": stats.total_events,
            "message_count": stats.message_count,
            "tool_call_count": stats.tool_call_count,
            "error_count": stats.error_count,
            "start_time": stats.start_time,
            "end_time": stats.end_time,
            "duration_seconds": stats.duration_seconds,
            "total_size_bytes": stats.total_size_bytes,
            "total_tokens": stats.total_tokens,
            "total_cost": stats.total_cost,
        },
        "events": events,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}

pub fn to_markdown(
    session_id: &str,
    session: Option<&SessionData>,
    stats: &SessionStats,
    events: &[ArchiveEvent],
) -> String {
    let mut out = String::new();

    let title = session
        .and_then(|s| s.title.clone())
        .unwrap_or_else(|| session_id.to_string());
    out.push_str(&format!("# {}\n\n", title));

    if let Some(summary) = session.and_then(|s| s.summary.as_deref()) {
        out.push_str(summary);
        out.push_str("\n\n");
    }

    out.push_str(&format!(
        "- Events: {}\n- Messages: {}\n- Tool calls: {}\n- Errors: {}\n- Tokens: {}\n- Cost: ${:.4}\n\n",
        stats.total_events,
        stats.message_count,
        stats.tool_call_count,
        stats.error_count,
        stats.total_tokens,
        stats.total_cost,
    ));

    out.push_str("## Timeline\n\n");
    for event in events {
        let detail = event_detail(event);
        out.push_str(&format!(
            "- `{}` **{}** {}\n",
            format_iso_millis(event.timestamp),
            event.kind.as_str(),
            detail
        ));
    }

    out
}

pub fn to_text(session_id: &str, stats: &SessionStats, events: &[ArchiveEvent]) -> String {
    let mut out = format!(
        "Session {} ({} events, {} messages, {} tool calls)\n",
        session_id, stats.total_events, stats.message_count, stats.tool_call_count
    );
    for event in events {
        out.push_str(&format!(
            "{}  {:<22} {}\n",
            format_iso_millis(event.timestamp),
            event.kind.as_str(),
            event_detail(event)
        ));
    }
    out
}

pub fn to_csv(events: &[ArchiveEvent]) -> String {
    let mut out =
        String::from("event_id,parent_event_id,event_type,timestamp,role,tool_name,is_error\n");
    for event in events {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            csv_field(&event.event_id),
            csv_field(event.parent_event_id.as_deref().unwrap_or("")),
            event.kind.as_str(),
            event.timestamp,
            csv_field(event.role.as_deref().unwrap_or("")),
            csv_field(event.tool_name.as_deref().unwrap_or("")),
            event.is_error,
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn event_detail(event: &ArchiveEvent) -> String {
    if let Some(tool) = &event.tool_name {
        return format!("tool={}", tool);
    }
    if let Some(role) = &event.role {
        return format!("role={}", role);
    }
    if let Some(subtype) = &event.event_subtype {
        return format!("subtype={}", subtype);
    }
    String::new()
}
