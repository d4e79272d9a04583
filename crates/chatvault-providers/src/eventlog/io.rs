use chatvault_types::util::parse_iso_millis;
use chatvault_types::ArchiveEvent;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::eventlog::parser::normalize_record;
use crate::eventlog::schema::LogRecord;
use crate::Result;

/// Lazy event stream over one append-only JSONL file.
///
/// Blank lines and lines that fail to parse are skipped with a warning;
/// only a missing file is a hard error. When a watermark is set, records
/// with `timestamp <= watermark` are dropped along with their fan-out.
pub struct EventStream {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    pending: VecDeque<ArchiveEvent>,
    watermark: Option<i64>,
    line_number: usize,
}

impl EventStream {
    pub fn open(path: &Path, watermark: Option<i64>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            pending: VecDeque::new(),
            watermark,
            line_number: 0,
        })
    }

    fn refill(&mut self) -> bool {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    warn!(path = %self.path.display(), line = self.line_number + 1,
                          error = %err, "read error, stopping stream");
                    return false;
                }
                None => return false,
            };
            self.line_number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let raw: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(err) => {
                    warn!(path = %self.path.display(), line = self.line_number,
                          error = %err, "skipping malformed line");
                    continue;
                }
            };

            let record: LogRecord = match serde_json::from_value(raw.clone()) {
                Ok(record) => record,
                Err(err) => {
                    warn!(path = %self.path.display(), line = self.line_number,
                          error = %err, "skipping unreadable record");
                    continue;
                }
            };

            let events = normalize_record(record, raw);
            let events: Vec<ArchiveEvent> = match self.watermark {
                Some(watermark) => events
                    .into_iter()
                    .filter(|e| e.timestamp > watermark)
                    .collect(),
                None => events,
            };

            if events.is_empty() {
                continue;
            }
            self.pending.extend(events);
            return true;
        }
    }
}

impl Iterator for EventStream {
    type Item = ArchiveEvent;

    fn next(&mut self) -> Option<ArchiveEvent> {
        if self.pending.is_empty() && !self.refill() {
            return None;
        }
        self.pending.pop_front()
    }
}

/// Parse a whole event-log file, optionally filtered to timestamps
/// strictly greater than `watermark`.
pub fn parse_log_file(path: &Path, watermark: Option<i64>) -> Result<Vec<ArchiveEvent>> {
    Ok(EventStream::open(path, watermark)?.collect())
}

/// Cheap header read for discovery: session id and start time from the
/// first lines of a file, without parsing the whole log.
#[derive(Debug, Default)]
pub struct LogHeader {
    pub session_id: Option<String>,
    pub started_at: Option<i64>,
    pub cwd: Option<String>,
}

pub fn read_header(path: &Path) -> Result<LogHeader> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut header = LogHeader::default();

    for line in reader.lines().take(10) {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        if value.get("type").and_then(Value::as_str) == Some("session") {
            header.session_id = value
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
            header.cwd = value
                .get("cwd")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        if header.started_at.is_none() {
            header.started_at = value
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_iso_millis);
        }
        if header.session_id.is_some() && header.started_at.is_some() {
            break;
        }
    }

    Ok(header)
}
