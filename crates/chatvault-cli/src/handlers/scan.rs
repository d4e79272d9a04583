use anyhow::Result;
use chatvault_runtime::{ScanMode, ScanProgress, Scanner};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::context::CliContext;

pub fn run(ctx: &CliContext, mode: ScanMode, force: bool, dir: Option<PathBuf>) -> Result<()> {
    let mut archive = ctx.open_archive()?;

    let roots = match dir {
        Some(dir) => vec![dir],
        None => ctx.scan_roots(),
    };
    let mut scanner = Scanner::with_roots(&mut archive, &ctx.state_dir, roots);

    let outcome = scanner.scan(mode, force, |progress| match progress {
        ScanProgress::Started { mode, file_count } => {
            println!("Scanning {} files (mode: {})", file_count, mode.as_str());
        }
        ScanProgress::FileFailed { path } => {
            eprintln!("  {} {}", "skipped".yellow(), path.display());
        }
        ScanProgress::SessionSummarized { session_id } => {
            println!("  summarized {}", session_id);
        }
        ScanProgress::FileIngested { .. } | ScanProgress::Completed { .. } => {}
    })?;

    println!(
        "{}: {} files scanned, {} failed",
        "Scan complete".green(),
        outcome.files_scanned,
        outcome.files_failed
    );
    if mode.includes_events() {
        println!(
            "  events:   {} inserted, {} skipped, {} errors",
            outcome.events.inserted, outcome.events.skipped, outcome.events.errors
        );
    }
    if mode.includes_messages() {
        println!(
            "  messages: {} inserted, {} skipped, {} errors",
            outcome.messages.inserted, outcome.messages.skipped, outcome.messages.errors
        );
    }
    if mode.includes_sessions() {
        println!("  sessions: {} updated", outcome.sessions_updated);
    }

    Ok(())
}
