use anyhow::Result;

use crate::args::{Cli, Commands};
use crate::context::CliContext;
use crate::handlers;

pub fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::resolve(cli.state_dir.as_deref())?;

    match cli.command {
        Commands::Scan { mode, force, dir } => handlers::scan::run(&ctx, mode.into(), force, dir),
        Commands::Import { command } => handlers::import::run(&ctx, &command),
        Commands::Sessions { command } => handlers::sessions::run(&ctx, &command),
        Commands::Messages { command } => handlers::messages::run(&ctx, &command),
        Commands::Export {
            session,
            format,
            output,
        } => handlers::export::run(&ctx, &session, format, output),
        Commands::Context {
            start,
            end,
            session_key,
        } => {
            let archive = ctx.open_archive()?;
            let transcript = archive.conversation_context(start, end, session_key.as_deref())?;
            print!("{}", transcript);
            Ok(())
        }
        Commands::Checkpoint { command } => handlers::state::checkpoint(&ctx, &command),
        Commands::Db { command } => handlers::state::db(&ctx, &command),
    }
}
