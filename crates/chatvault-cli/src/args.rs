use chatvault_runtime::{ImportSource, ScanMode};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatvault")]
#[command(about = "Archive and query agent sessions and chat history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Platform state directory (default: $CHATVAULT_STATE or the user data dir)
    #[arg(long, global = true)]
    pub state_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Scan session logs into the archive")]
    Scan {
        #[arg(long, default_value = "messages", help = "What to ingest")]
        mode: ModeArg,

        #[arg(long, help = "Ignore the watermark and relax referential checks (backfill)")]
        force: bool,

        #[arg(long, help = "Override the scan root directory")]
        dir: Option<PathBuf>,
    },

    #[command(about = "Bulk-import historical chat exports")]
    Import {
        #[command(subcommand)]
        command: ImportCommand,
    },

    #[command(about = "List, inspect and search sessions")]
    Sessions {
        #[command(subcommand)]
        command: SessionCommand,
    },

    #[command(about = "List and search archived messages")]
    Messages {
        #[command(subcommand)]
        command: MessageCommand,
    },

    #[command(about = "Export one session in a chosen format")]
    Export {
        /// Session id (a unique prefix is enough)
        session: String,

        #[arg(long, default_value = "jsonl")]
        format: FormatArg,

        #[arg(long, help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },

    #[command(about = "Render a transcript window for LLM consumption")]
    Context {
        /// Window start, epoch milliseconds
        start: i64,

        /// Window end, epoch milliseconds
        end: i64,

        #[arg(long)]
        session_key: Option<String>,
    },

    #[command(about = "Inspect scanner checkpoints and backfill history")]
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommand,
    },

    #[command(about = "Archive maintenance")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[derive(Subcommand)]
pub enum ImportCommand {
    #[command(about = "Telegram Desktop JSON export")]
    Telegram { file: PathBuf },

    #[command(about = "WhatsApp text export")]
    Whatsapp { file: PathBuf },

    #[command(about = "Discord JSON export")]
    Discord { file: PathBuf },

    #[command(about = "Backfill archived session logs from a directory")]
    Sessions { dir: PathBuf },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    #[command(about = "List archived sessions")]
    List {
        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long, help = "Derive the listing from raw events instead of session rows")]
        from_events: bool,
    },

    #[command(about = "Show one session with stats")]
    Show { session: String },

    #[command(about = "Full-text search over titles and summaries")]
    Search {
        query: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum MessageCommand {
    #[command(about = "List messages with filters")]
    List {
        #[arg(long)]
        session_key: Option<String>,

        #[arg(long)]
        channel: Option<String>,

        #[arg(long)]
        sender: Option<String>,

        #[arg(long, help = "Inclusive lower bound, epoch milliseconds")]
        since: Option<i64>,

        #[arg(long, help = "Inclusive upper bound, epoch milliseconds")]
        until: Option<i64>,

        #[arg(long, help = "Include soft-deleted messages")]
        include_deleted: bool,

        #[arg(long, default_value = "50")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    #[command(about = "Ranked full-text search")]
    Search {
        query: String,

        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum CheckpointCommand {
    #[command(about = "List all scanner-state entries")]
    List,
}

#[derive(Subcommand)]
pub enum DbCommand {
    #[command(about = "Reclaim space in the archive file")]
    Vacuum,

    #[command(about = "Recompute denormalized counters for one session")]
    RefreshCounts { session: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Messages,
    Events,
    Sessions,
    Both,
    All,
}

impl From<ModeArg> for ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Messages => ScanMode::Messages,
            ModeArg::Events => ScanMode::Events,
            ModeArg::Sessions => ScanMode::Sessions,
            ModeArg::Both => ScanMode::Both,
            ModeArg::All => ScanMode::All,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Jsonl,
    Json,
    Markdown,
    Text,
    Csv,
}

pub fn import_source(command: &ImportCommand) -> Option<(ImportSource, &PathBuf)> {
    match command {
        ImportCommand::Telegram { file } => Some((ImportSource::Telegram, file)),
        ImportCommand::Whatsapp { file } => Some((ImportSource::Whatsapp, file)),
        ImportCommand::Discord { file } => Some((ImportSource::Discord, file)),
        ImportCommand::Sessions { .. } => None,
    }
}
