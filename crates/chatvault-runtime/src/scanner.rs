use chatvault_providers::eventlog::{parse_log_file, session_metadata};
use chatvault_store::{
    Archive, BatchOutcome, LAST_EVENTS_SCAN_TIMESTAMP, LAST_SCAN_TIMESTAMP,
    LAST_SESSIONS_SCAN_TIMESTAMP,
};
use chatvault_types::util::now_millis;
use chatvault_types::{
    ArchiveEvent, Direction, EventKind, MessageRecord, SessionData, SessionStatus, SessionType,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;
use walkdir::WalkDir;

use crate::summarize::{local_summary, LocalSummarizer, Summarizer};
use crate::{Error, Result};

/// Channel tag for messages lifted out of native agent session logs.
const AGENT_CHANNEL: &str = "agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Messages,
    Events,
    Sessions,
    Both,
    All,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Messages => "messages",
            ScanMode::Events => "events",
            ScanMode::Sessions => "sessions",
            ScanMode::Both => "both",
            ScanMode::All => "all",
        }
    }

    pub fn includes_messages(&self) -> bool {
        matches!(self, ScanMode::Messages | ScanMode::Both | ScanMode::All)
    }

    pub fn includes_events(&self) -> bool {
        matches!(self, ScanMode::Events | ScanMode::Both | ScanMode::All)
    }

    pub fn includes_sessions(&self) -> bool {
        matches!(self, ScanMode::Sessions | ScanMode::All)
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "messages" => Ok(ScanMode::Messages),
            "events" => Ok(ScanMode::Events),
            "sessions" => Ok(ScanMode::Sessions),
            "both" => Ok(ScanMode::Both),
            "all" => Ok(ScanMode::All),
            _ => Err(format!("Unknown scan mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScanProgress {
    Started {
        mode: ScanMode,
        file_count: usize,
    },
    FileIngested {
        path: PathBuf,
        outcome: BatchOutcome,
    },
    FileFailed {
        path: PathBuf,
    },
    SessionSummarized {
        session_id: String,
    },
    Completed {
        outcome: ScanOutcome,
    },
}

/// Counters aggregated across all files of one scan run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOutcome {
    pub files_scanned: usize,
    pub files_failed: usize,
    pub events: BatchOutcome,
    pub messages: BatchOutcome,
    pub sessions_updated: usize,
}

/// The ingest executive: enumerates session logs under the scan roots and
/// replays parser output into the archive with checkpoints and duplicate
/// elision.
pub struct Scanner<'a> {
    archive: &'a mut Archive,
    state_dir: PathBuf,
    roots: Vec<PathBuf>,
}

impl<'a> Scanner<'a> {
    pub fn new(archive: &'a mut Archive, state_dir: &Path) -> Self {
        let roots = crate::config::scan_roots(state_dir);
        Self {
            archive,
            state_dir: state_dir.to_path_buf(),
            roots,
        }
    }

    /// Replace the default scan roots (for `--dir` overrides and backfill).
    pub fn with_roots(archive: &'a mut Archive, state_dir: &Path, roots: Vec<PathBuf>) -> Self {
        Self {
            archive,
            state_dir: state_dir.to_path_buf(),
            roots,
        }
    }

    /// Run one scan. `force` resets the watermark to zero and suspends
    /// foreign-key enforcement per batch, permitting historical backfill
    /// with incomplete parent chains.
    pub fn scan<F>(&mut self, mode: ScanMode, force: bool, on_progress: F) -> Result<ScanOutcome>
    where
        F: FnMut(ScanProgress),
    {
        self.scan_with_summarizer(mode, force, &LocalSummarizer, on_progress)
    }

    /// Like [`scan`](Self::scan) with an external summarizer driving session
    /// labels; any summarizer error falls back to the local one.
    pub fn scan_with_summarizer<F>(
        &mut self,
        mode: ScanMode,
        force: bool,
        summarizer: &dyn Summarizer,
        mut on_progress: F,
    ) -> Result<ScanOutcome>
    where
        F: FnMut(ScanProgress),
    {
        if !self.roots.iter().any(|root| root.exists()) {
            return Err(Error::InvalidOperation(format!(
                "No scan root exists under {}",
                self.state_dir.display()
            )));
        }

        let files = self.enumerate_files();
        on_progress(ScanProgress::Started {
            mode,
            file_count: files.len(),
        });

        let mut outcome = ScanOutcome::default();

        if mode.includes_events() {
            self.events_pass(&files, force, &mut outcome, &mut on_progress)?;
        }
        if mode.includes_messages() {
            self.messages_pass(&files, force, &mut outcome, &mut on_progress)?;
        }
        if mode.includes_sessions() {
            self.sessions_pass(&files, force, summarizer, &mut outcome, &mut on_progress)?;
        }

        on_progress(ScanProgress::Completed { outcome });
        Ok(outcome)
    }

    /// All `*.jsonl` files under the roots, skipping lock markers and
    /// files flagged deleted. Sorted for reproducible runs; no cross-file
    /// ordering is promised to callers.
    fn enumerate_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in &self.roots {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if path.extension().is_none_or(|ext| ext != "jsonl") {
                    continue;
                }
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if name.contains(".deleted.") {
                    continue;
                }
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        files
    }

    fn events_pass<F>(
        &mut self,
        files: &[PathBuf],
        force: bool,
        outcome: &mut ScanOutcome,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(ScanProgress),
    {
        let watermark = if force {
            0
        } else {
            self.archive.watermark(LAST_EVENTS_SCAN_TIMESTAMP)?
        };

        for path in files {
            let events = match parse_log_file(path, Some(watermark)) {
                Ok(events) => events,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable log file");
                    outcome.files_failed += 1;
                    on_progress(ScanProgress::FileFailed { path: path.clone() });
                    continue;
                }
            };

            let session_id = file_session_id(path);
            let session_key = derive_session_key(&self.state_dir, path);

            let batch = self.archive.insert_events_batch(
                &events,
                &session_key,
                session_id.as_deref(),
                force,
            )?;
            outcome.events.inserted += batch.inserted;
            outcome.events.skipped += batch.skipped;
            outcome.events.errors += batch.errors;
            outcome.files_scanned += 1;
            on_progress(ScanProgress::FileIngested {
                path: path.clone(),
                outcome: batch,
            });
        }

        // Monotonic checkpoint: end-of-run wall clock, not per-file maxima.
        self.archive
            .set_checkpoint(LAST_EVENTS_SCAN_TIMESTAMP, &now_millis().to_string())?;
        Ok(())
    }

    fn messages_pass<F>(
        &mut self,
        files: &[PathBuf],
        force: bool,
        outcome: &mut ScanOutcome,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(ScanProgress),
    {
        let watermark = if force {
            0
        } else {
            self.archive.watermark(LAST_SCAN_TIMESTAMP)?
        };

        for path in files {
            let events = match parse_log_file(path, Some(watermark)) {
                Ok(events) => events,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable log file");
                    outcome.files_failed += 1;
                    on_progress(ScanProgress::FileFailed { path: path.clone() });
                    continue;
                }
            };

            let session_id = file_session_id(path);
            let session_key = derive_session_key(&self.state_dir, path);
            let records: Vec<MessageRecord> = events
                .iter()
                .filter_map(|event| chat_message_record(event, &session_key, &session_id))
                .collect();

            let batch = self.archive.insert_messages_batch(&records)?;
            outcome.messages.inserted += batch.inserted;
            outcome.messages.skipped += batch.skipped;
            outcome.messages.errors += batch.errors;
            outcome.files_scanned += 1;
            on_progress(ScanProgress::FileIngested {
                path: path.clone(),
                outcome: batch,
            });
        }

        self.archive
            .set_checkpoint(LAST_SCAN_TIMESTAMP, &now_millis().to_string())?;
        Ok(())
    }

    fn sessions_pass<F>(
        &mut self,
        files: &[PathBuf],
        force: bool,
        summarizer: &dyn Summarizer,
        outcome: &mut ScanOutcome,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(ScanProgress),
    {
        let watermark = if force {
            0
        } else {
            self.archive.watermark(LAST_SESSIONS_SCAN_TIMESTAMP)?
        };

        for path in files {
            let events = match parse_log_file(path, None) {
                Ok(events) => events,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable log file");
                    outcome.files_failed += 1;
                    on_progress(ScanProgress::FileFailed { path: path.clone() });
                    continue;
                }
            };

            let meta = session_metadata(&events);
            // Untouched since the last sessions pass: nothing to refresh.
            if meta.last_timestamp.is_none_or(|last| last <= watermark) {
                continue;
            }

            let Some(session_id) = file_session_id(path) else {
                continue;
            };
            let session_key = derive_session_key(&self.state_dir, path);

            let mut session = SessionData::new(&session_id);
            session.session_key = Some(session_key.clone());
            session.session_type = SessionType::from_session_key(&session_key);
            session.agent_id = agent_from_session_key(&session_key);
            session.model = events.iter().rev().find_map(|e| e.model_id.clone());
            session.started_at = meta.first_timestamp;
            session.ended_at = meta.last_timestamp;
            session.status = if lock_file_exists(path) {
                SessionStatus::Active
            } else {
                SessionStatus::Completed
            };
            session.event_count = meta.event_count as i64;
            session.message_count = events
                .iter()
                .filter(|e| e.kind == EventKind::Message)
                .count() as i64;

            let summary = summarizer.summarize(&session, &events).unwrap_or_else(|err| {
                warn!(session_id = %session.id, error = %err,
                      "summarizer failed, using local fallback");
                local_summary(&session, &events)
            });
            session.title = Some(summary.title);
            session.summary = Some(summary.summary);

            self.archive.upsert_session(&session)?;
            outcome.sessions_updated += 1;
            on_progress(ScanProgress::SessionSummarized {
                session_id: session.id.clone(),
            });
        }

        self.archive
            .set_checkpoint(LAST_SESSIONS_SCAN_TIMESTAMP, &now_millis().to_string())?;
        Ok(())
    }
}

/// Session identifier: the file basename without extension.
fn file_session_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

/// Map a log file's directory layout to a colon-joined session key.
///
/// `agents/<agent>/sessions/x.jsonl`          -> `agent:<agent>:main`
/// `agents/<agent>/subagent/sessions/x.jsonl` -> `agent:<agent>:subagent`
/// `cron/runs/x.jsonl`                        -> `cron`
/// Anything else falls back to the first two path segments joined by a
/// colon, which keeps keys stable for unknown layouts.
pub fn derive_session_key(state_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(state_dir).unwrap_or(path);
    let segments: Vec<&str> = relative
        .parent()
        .map(|parent| {
            parent
                .iter()
                .filter_map(|part| part.to_str())
                .filter(|part| *part != "/")
                .collect::<Vec<&str>>()
        })
        .unwrap_or_default();

    match segments.as_slice() {
        ["agents", agent, "sessions"] => format!("agent:{}:main", agent),
        ["agents", agent, "subagent", "sessions"] => format!("agent:{}:subagent", agent),
        ["cron", "runs"] => "cron".to_string(),
        other => {
            let mut key: Vec<&str> = other.iter().take(2).copied().collect();
            if key.is_empty() {
                key.push("unknown");
            }
            key.join(":")
        }
    }
}

fn agent_from_session_key(session_key: &str) -> Option<String> {
    let mut parts = session_key.split(':');
    if parts.next() == Some("agent") {
        parts.next().map(str::to_string)
    } else {
        None
    }
}

fn lock_file_exists(path: &Path) -> bool {
    let mut lock_name = path.as_os_str().to_os_string();
    lock_name.push(".lock");
    PathBuf::from(lock_name).exists()
}

/// Lift a `message` event into a normalized chat message row. Only user
/// and assistant turns become messages; tool results stay events.
fn chat_message_record(
    event: &ArchiveEvent,
    session_key: &str,
    session_id: &Option<String>,
) -> Option<MessageRecord> {
    if event.kind != EventKind::Message {
        return None;
    }
    let role = event.role.as_deref()?;
    let direction = match role {
        "user" => Direction::Inbound,
        "assistant" => Direction::Outbound,
        _ => return None,
    };

    let text = full_message_text(&event.raw)?;
    if text.is_empty() {
        return None;
    }

    let mut record = MessageRecord::new(
        event.event_id.clone(),
        session_key,
        AGENT_CHANNEL,
        direction,
        event.timestamp,
    );
    record.session_id = session_id.clone();
    record.sender_id = Some(role.to_string());
    record.sender_name = Some(role.to_string());
    record.content_text = Some(text);
    record.raw = event.raw.clone();
    Some(record)
}

/// Concatenate every text block of a message record's content.
fn full_message_text(raw: &Value) -> Option<String> {
    let content = raw.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        _ => None,
    }
}
