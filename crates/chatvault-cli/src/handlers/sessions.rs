use anyhow::Result;
use chatvault_store::{Archive, EventFilter, SessionFilter};
use chatvault_types::util::format_iso_millis;
use owo_colors::OwoColorize;

use crate::args::SessionCommand;
use crate::context::CliContext;

pub fn run(ctx: &CliContext, command: &SessionCommand) -> Result<()> {
    let archive = ctx.open_archive()?;

    match command {
        SessionCommand::List { limit, from_events } => list(&archive, *limit, *from_events),
        SessionCommand::Show { session } => show(&archive, session),
        SessionCommand::Search { query, limit } => search(&archive, query, *limit),
    }
}

fn list(archive: &Archive, limit: usize, from_events: bool) -> Result<()> {
    if from_events {
        for entry in archive.list_sessions()?.into_iter().take(limit) {
            println!(
                "{}  {}  {} events  {} .. {}",
                entry.session_id.bold(),
                entry.session_key.as_deref().unwrap_or("-"),
                entry.event_count,
                format_iso_millis(entry.first_timestamp),
                format_iso_millis(entry.last_timestamp),
            );
        }
        return Ok(());
    }

    let sessions = archive.query_sessions(&SessionFilter {
        limit: Some(limit),
        ..Default::default()
    })?;
    if sessions.is_empty() {
        println!("No sessions archived yet. Run `chatvault scan --mode all` first.");
        return Ok(());
    }
    for session in sessions {
        println!(
            "{}  [{}] [{}]  {}",
            session.id.bold(),
            session.session_type.as_str(),
            session.status.as_str(),
            session.title.as_deref().unwrap_or("(untitled)"),
        );
    }
    Ok(())
}

fn show(archive: &Archive, session_arg: &str) -> Result<()> {
    let session_id = resolve_session_id(archive, session_arg)?;
    let stats = archive.session_stats(&session_id)?;

    if let Some(session) = archive.get_session(&session_id)? {
        println!("{}", session.title.as_deref().unwrap_or(&session_id).bold());
        if let Some(summary) = &session.summary {
            println!("{}", summary);
        }
        println!(
            "type: {}  status: {}  key: {}",
            session.session_type.as_str(),
            session.status.as_str(),
            session.session_key.as_deref().unwrap_or("-"),
        );
    } else {
        println!("{}", session_id.bold());
    }

    println!(
        "events: {}  messages: {}  tool calls: {}  errors: {}",
        stats.total_events, stats.message_count, stats.tool_call_count, stats.error_count
    );
    if let (Some(start), Some(end)) = (stats.start_time, stats.end_time) {
        println!(
            "window: {} .. {} ({:.0}s)",
            format_iso_millis(start),
            format_iso_millis(end),
            stats.duration_seconds
        );
    }
    println!(
        "tokens: {}  cost: ${:.4}  size: {} bytes",
        stats.total_tokens, stats.total_cost, stats.total_size_bytes
    );

    let events = archive.session_events(
        &session_id,
        &EventFilter {
            include_thinking: false,
            include_usage: false,
            ..Default::default()
        },
    )?;
    if let Some(last) = events.last() {
        println!("last event: {} at {}", last.kind.as_str(), format_iso_millis(last.timestamp));
    }

    Ok(())
}

fn search(archive: &Archive, query: &str, limit: usize) -> Result<()> {
    let sessions = archive.search_sessions(query, limit)?;
    if sessions.is_empty() {
        println!("No sessions match '{}'", query);
        return Ok(());
    }
    for session in sessions {
        println!(
            "{}  {}",
            session.id.bold(),
            session.title.as_deref().unwrap_or("(untitled)"),
        );
    }
    Ok(())
}

pub(crate) fn resolve_session_id(archive: &Archive, arg: &str) -> Result<String> {
    match archive.find_session_by_prefix(arg)? {
        Some(id) => Ok(id),
        None => Ok(arg.to_string()),
    }
}
