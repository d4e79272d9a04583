use anyhow::Result;
use chatvault_runtime::{import_file, import_session_logs};
use owo_colors::OwoColorize;

use crate::args::{import_source, ImportCommand};
use crate::context::CliContext;

pub fn run(ctx: &CliContext, command: &ImportCommand) -> Result<()> {
    let mut archive = ctx.open_archive()?;

    if let Some((source, file)) = import_source(command) {
        let outcome = import_file(&mut archive, source, file)?;
        println!(
            "{} {} from {}: {} inserted, {} skipped, {} attachments",
            "Imported".green(),
            source.as_str(),
            file.display(),
            outcome.inserted,
            outcome.skipped,
            outcome.attachments
        );
        return Ok(());
    }

    let ImportCommand::Sessions { dir } = command else {
        unreachable!("import_source covers every other variant");
    };
    let outcome = import_session_logs(&mut archive, &ctx.state_dir, dir)?;
    println!(
        "{} session logs from {}: {} inserted, {} skipped, {} errors",
        "Backfilled".green(),
        dir.display(),
        outcome.events.inserted,
        outcome.events.skipped,
        outcome.events.errors
    );
    Ok(())
}
