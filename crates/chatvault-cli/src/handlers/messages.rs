use anyhow::Result;
use chatvault_store::{MessageFilter, StoredMessage};
use chatvault_types::util::{format_iso_millis, truncate};
use owo_colors::OwoColorize;

use crate::args::MessageCommand;
use crate::context::CliContext;

pub fn run(ctx: &CliContext, command: &MessageCommand) -> Result<()> {
    let archive = ctx.open_archive()?;

    let rows = match command {
        MessageCommand::List {
            session_key,
            channel,
            sender,
            since,
            until,
            include_deleted,
            limit,
            offset,
        } => archive.query_messages(&MessageFilter {
            session_key: session_key.clone(),
            channel: channel.clone(),
            sender_id: sender.clone(),
            since: *since,
            until: *until,
            content_match: None,
            include_deleted: *include_deleted,
            limit: Some(*limit),
            offset: Some(*offset),
        })?,
        MessageCommand::Search { query, limit } => archive.search(query, *limit)?,
    };

    if rows.is_empty() {
        println!("No messages found.");
        return Ok(());
    }
    for row in rows {
        print_row(&row);
    }
    Ok(())
}

fn print_row(row: &StoredMessage) {
    let record = &row.record;
    let sender = record
        .sender_name
        .as_deref()
        .or(record.sender_id.as_deref())
        .unwrap_or("unknown");
    let text = record.content_text.as_deref().unwrap_or("");
    let deleted = if record.deleted_at.is_some() {
        " [deleted]"
    } else {
        ""
    };

    println!(
        "{} ({}) {}: {}{}",
        format_iso_millis(record.timestamp).dimmed(),
        record.channel,
        sender.bold(),
        truncate(text, 100),
        deleted.red(),
    );
}
