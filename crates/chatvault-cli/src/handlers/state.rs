use anyhow::Result;
use chatvault_types::util::format_iso_millis;
use owo_colors::OwoColorize;

use crate::args::{CheckpointCommand, DbCommand};
use crate::context::CliContext;
use crate::handlers::sessions::resolve_session_id;

pub fn checkpoint(ctx: &CliContext, command: &CheckpointCommand) -> Result<()> {
    let archive = ctx.open_archive()?;

    match command {
        CheckpointCommand::List => {
            let entries = archive.list_checkpoints()?;
            if entries.is_empty() {
                println!("No scanner state recorded yet.");
                return Ok(());
            }
            for (key, value, updated_at) in entries {
                println!(
                    "{}  {}  (updated {})",
                    key.bold(),
                    value,
                    format_iso_millis(updated_at)
                );
            }
            Ok(())
        }
    }
}

pub fn db(ctx: &CliContext, command: &DbCommand) -> Result<()> {
    let archive = ctx.open_archive()?;

    match command {
        DbCommand::Vacuum => {
            archive.vacuum()?;
            println!("{}", "Archive vacuumed".green());
        }
        DbCommand::RefreshCounts { session } => {
            let session_id = resolve_session_id(&archive, session)?;
            archive.refresh_session_counts(&session_id)?;
            println!("Refreshed counters for {}", session_id);
        }
    }
    Ok(())
}
