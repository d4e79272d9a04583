// Runtime layer: configuration, the scan executive, summarization and
// bulk backfill. Owns no storage; everything flows through the Archive.

pub mod backfill;
pub mod config;
mod error;
pub mod scanner;
pub mod summarize;

pub use backfill::{import_file, import_session_logs, ImportOutcome, ImportSource};
pub use error::{Error, Result};
pub use scanner::{derive_session_key, ScanMode, ScanOutcome, ScanProgress, Scanner};
pub use summarize::{local_summary, LocalSummarizer, SessionSummary, Summarizer};
