//! End-to-end scanner coverage over a synthetic state directory.

use chatvault_runtime::{
    import_file, import_session_logs, ImportSource, ScanMode, Scanner, SessionSummary, Summarizer,
};
use chatvault_store::{Archive, EventFilter, MessageFilter, SessionFilter};
use chatvault_types::{ArchiveEvent, EventKind, SessionData, SessionStatus};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct StateFixture {
    _temp: TempDir,
    state_dir: PathBuf,
}

impl StateFixture {
    fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let state_dir = temp.path().join("state");
        fs::create_dir_all(state_dir.join("agents/main/sessions")).unwrap();
        Self {
            _temp: temp,
            state_dir,
        }
    }

    fn write_log(&self, relative: &str, lines: &[String]) -> PathBuf {
        let path = self.state_dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn archive(&self) -> Archive {
        Archive::open_in_memory().unwrap()
    }
}

fn session_line(id: &str, timestamp: &str) -> String {
    json!({"type": "session", "id": id, "version": 3, "timestamp": timestamp, "cwd": "/x"})
        .to_string()
}

fn user_line(id: &str, parent: &str, timestamp: &str, text: &str) -> String {
    json!({
        "type": "message", "id": id, "parentId": parent, "timestamp": timestamp,
        "message": {"role": "user", "content": text}
    })
    .to_string()
}

fn assistant_line(id: &str, parent: &str, timestamp: &str) -> String {
    json!({
        "type": "message", "id": id, "parentId": parent, "timestamp": timestamp,
        "message": {
            "role": "assistant",
            "model": "claude-sonnet-4",
            "provider": "anthropic",
            "content": [
                {"type": "thinking", "thinking": "checking the request"},
                {"type": "text", "text": "On it."},
                {"type": "toolCall", "id": "T1", "name": "exec", "arguments": {"cmd": "ls"}}
            ],
            "usage": {
                "input": 100, "output": 50, "totalTokens": 150,
                "cost": {"input": 0.001, "output": 0.002, "total": 0.003}
            }
        }
    })
    .to_string()
}

#[test]
fn test_first_scan_of_single_session_record() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[session_line("AAA", "2026-02-13T12:00:00.000Z")],
    );

    let mut archive = fixture.archive();
    let mut scanner = Scanner::new(&mut archive, &fixture.state_dir);
    let outcome = scanner.scan(ScanMode::Events, false, |_| {}).unwrap();

    assert_eq!(outcome.events.inserted, 1);
    assert_eq!(outcome.files_scanned, 1);

    let events = archive.session_events("AAA", &EventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, "AAA");
    assert_eq!(events[0].kind, EventKind::Session);
    assert_eq!(events[0].session_id.as_deref(), Some("AAA"));
    assert_eq!(events[0].session_key.as_deref(), Some("agent:main:main"));

    assert!(archive.watermark("last_events_scan_timestamp").unwrap() > 0);
}

#[test]
fn test_assistant_fan_out_lands_in_archive() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[
            session_line("AAA", "2026-02-13T12:00:00.000Z"),
            assistant_line("M", "AAA", "2026-02-13T12:00:01.000Z"),
        ],
    );

    let mut archive = fixture.archive();
    let mut scanner = Scanner::new(&mut archive, &fixture.state_dir);
    let outcome = scanner.scan(ScanMode::Events, false, |_| {}).unwrap();

    // session + message + tool_call + thinking_block + usage_stats
    assert_eq!(outcome.events.inserted, 5);
    assert_eq!(outcome.events.errors, 0);

    let events = archive.session_events("AAA", &EventFilter::default()).unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
    assert!(ids.contains(&"M_tool_T1"));
    assert!(ids.contains(&"M_thinking"));
    assert!(ids.contains(&"M_usage"));

    let stats = archive.session_stats("AAA").unwrap();
    assert_eq!(stats.total_events, 5);
    assert_eq!(stats.tool_call_count, 1);
    assert_eq!(stats.total_tokens, 150);
}

#[test]
fn test_rescan_is_idempotent() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[
            session_line("AAA", "2026-02-13T12:00:00.000Z"),
            assistant_line("M", "AAA", "2026-02-13T12:00:01.000Z"),
        ],
    );

    let mut archive = fixture.archive();
    let mut scanner = Scanner::new(&mut archive, &fixture.state_dir);
    let first = scanner.scan(ScanMode::Events, false, |_| {}).unwrap();
    assert_eq!(first.events.inserted, 5);

    // Non-forced rescan: the advanced watermark filters everything out.
    let mut scanner = Scanner::new(&mut archive, &fixture.state_dir);
    let second = scanner.scan(ScanMode::Events, false, |_| {}).unwrap();
    assert_eq!(second.events.inserted, 0);

    // Forced rescan re-reads the file; every event deduplicates.
    let mut scanner = Scanner::new(&mut archive, &fixture.state_dir);
    let forced = scanner.scan(ScanMode::Events, true, |_| {}).unwrap();
    assert_eq!(forced.events.inserted, 0);
    assert_eq!(forced.events.skipped, 5);

    assert_eq!(
        archive.session_events("AAA", &EventFilter::default()).unwrap().len(),
        5
    );
}

#[test]
fn test_watermark_is_monotonic() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[session_line("AAA", "2026-02-13T12:00:00.000Z")],
    );

    let mut archive = fixture.archive();
    Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Events, false, |_| {})
        .unwrap();
    let first = archive.watermark("last_events_scan_timestamp").unwrap();

    Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Events, false, |_| {})
        .unwrap();
    let second = archive.watermark("last_events_scan_timestamp").unwrap();

    assert!(first > 0);
    assert!(second >= first);
}

#[test]
fn test_orphan_child_under_normal_and_forced_scan() {
    let fixture = StateFixture::new();
    // A rotated log starting mid-session: the parent referenced by this
    // message never appears in the feed.
    fixture.write_log(
        "agents/main/sessions/BBB.jsonl",
        &[user_line("ORPHAN", "MISSING", "2026-02-13T12:00:05.000Z", "hi")],
    );

    let mut archive = fixture.archive();
    let outcome = Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Events, false, |_| {})
        .unwrap();
    assert_eq!(outcome.events.inserted, 0);
    assert_eq!(outcome.events.errors, 1);

    let outcome = Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Events, true, |_| {})
        .unwrap();
    assert_eq!(outcome.events.inserted, 1);
    assert_eq!(outcome.events.errors, 0);
}

#[test]
fn test_messages_mode_lifts_chat_turns() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[
            session_line("AAA", "2026-02-13T12:00:00.000Z"),
            user_line("U1", "AAA", "2026-02-13T12:00:01.000Z", "please check the deploy"),
            assistant_line("M", "U1", "2026-02-13T12:00:02.000Z"),
        ],
    );

    let mut archive = fixture.archive();
    let outcome = Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Messages, false, |_| {})
        .unwrap();
    assert_eq!(outcome.messages.inserted, 2);

    let rows = archive
        .query_messages(&MessageFilter {
            channel: Some("agent".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rows.len(), 2);

    let user_row = rows
        .iter()
        .find(|r| r.record.message_id == "U1")
        .expect("user turn archived");
    assert_eq!(user_row.record.direction.as_str(), "inbound");
    assert_eq!(
        user_row.record.content_text.as_deref(),
        Some("please check the deploy")
    );
    assert_eq!(user_row.record.session_id.as_deref(), Some("AAA"));

    assert!(archive.watermark("last_scan_timestamp").unwrap() > 0);
}

#[test]
fn test_sessions_mode_upserts_summary_rows() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[
            session_line("AAA", "2026-02-13T12:00:00.000Z"),
            user_line("U1", "AAA", "2026-02-13T12:00:01.000Z", "summarize the incident"),
            assistant_line("M", "U1", "2026-02-13T12:05:00.000Z"),
        ],
    );
    fixture.write_log(
        "cron/runs/CRON1.jsonl",
        &[session_line("CRON1", "2026-02-13T13:00:00.000Z")],
    );

    let mut archive = fixture.archive();
    let outcome = Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::All, false, |_| {})
        .unwrap();
    assert_eq!(outcome.sessions_updated, 2);

    let session = archive.get_session("AAA").unwrap().expect("session row");
    assert_eq!(session.session_key.as_deref(), Some("agent:main:main"));
    assert_eq!(session.agent_id.as_deref(), Some("main"));
    assert_eq!(session.model.as_deref(), Some("claude-sonnet-4"));
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.title.as_deref(), Some("summarize the incident"));
    assert!(session.summary.is_some());
    assert_eq!(session.event_count, 5);
    assert_eq!(session.message_count, 2);

    let cron = archive.get_session("CRON1").unwrap().expect("cron row");
    assert_eq!(cron.session_type.as_str(), "cron");

    let listed = archive.query_sessions(&SessionFilter::default()).unwrap();
    assert_eq!(listed.len(), 2);
}

struct FailingSummarizer;

impl Summarizer for FailingSummarizer {
    fn summarize(
        &self,
        _session: &SessionData,
        _events: &[ArchiveEvent],
    ) -> anyhow::Result<SessionSummary> {
        anyhow::bail!("model endpoint unreachable")
    }
}

#[test]
fn test_summarizer_failure_falls_back_to_local() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[
            session_line("AAA", "2026-02-13T12:00:00.000Z"),
            user_line("U1", "AAA", "2026-02-13T12:00:01.000Z", "check disk usage"),
        ],
    );

    let mut archive = fixture.archive();
    let outcome = Scanner::new(&mut archive, &fixture.state_dir)
        .scan_with_summarizer(ScanMode::Sessions, false, &FailingSummarizer, |_| {})
        .unwrap();
    assert_eq!(outcome.sessions_updated, 1);

    let session = archive.get_session("AAA").unwrap().unwrap();
    assert_eq!(session.title.as_deref(), Some("check disk usage"));
}

#[test]
fn test_lock_file_marks_session_active() {
    let fixture = StateFixture::new();
    let log = fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[session_line("AAA", "2026-02-13T12:00:00.000Z")],
    );
    fs::write(format!("{}.lock", log.display()), "").unwrap();

    let mut archive = fixture.archive();
    Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Sessions, false, |_| {})
        .unwrap();

    let session = archive.get_session("AAA").unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

#[test]
fn test_deleted_files_are_not_scanned() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.deleted.jsonl",
        &[session_line("AAA", "2026-02-13T12:00:00.000Z")],
    );
    fixture.write_log(
        "agents/main/sessions/BBB.jsonl",
        &[session_line("BBB", "2026-02-13T12:00:00.000Z")],
    );

    let mut archive = fixture.archive();
    let outcome = Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Events, false, |_| {})
        .unwrap();
    assert_eq!(outcome.files_scanned, 1);
    assert_eq!(outcome.events.inserted, 1);
}

#[test]
fn test_non_log_entries_are_ignored() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/GOOD.jsonl",
        &[session_line("GOOD", "2026-02-13T12:00:00.000Z")],
    );
    fs::write(fixture.state_dir.join("agents/main/sessions/notes.txt"), "junk").unwrap();
    fs::create_dir_all(fixture.state_dir.join("agents/main/sessions/BAD.jsonl/x")).unwrap();

    let mut archive = fixture.archive();
    let outcome = Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Events, false, |_| {})
        .unwrap();
    assert_eq!(outcome.files_scanned, 1);
    assert_eq!(outcome.events.inserted, 1);
}

#[test]
fn test_missing_scan_roots_are_fatal() {
    let temp = TempDir::new().unwrap();
    let empty_state = temp.path().join("nothing-here");

    let mut archive = Archive::open_in_memory().unwrap();
    let result = Scanner::new(&mut archive, &empty_state).scan(ScanMode::Events, false, |_| {});
    assert!(result.is_err());
}

#[test]
fn test_telegram_import_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let export_path = temp.path().join("telegram.json");
    fs::write(
        &export_path,
        json!({
            "name": "Alice", "type": "personal_chat", "id": 42,
            "messages": [
                {"id": 1, "type": "message", "date": "2023-12-31T22:30:00",
                 "date_unixtime": "1704061800", "from": "Alice", "from_id": "user1",
                 "text": "hello"},
                {"id": 2, "type": "message", "date": "2023-12-31T22:31:00",
                 "date_unixtime": "1704061860", "from": "You", "from_id": "user_self",
                 "text": "hi back"}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let mut archive = Archive::open_in_memory().unwrap();

    let first = import_file(&mut archive, ImportSource::Telegram, &export_path).unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.skipped, 0);

    let second = import_file(&mut archive, ImportSource::Telegram, &export_path).unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);

    // Each run leaves one audit entry in scanner state.
    let backfills = archive
        .list_checkpoints()
        .unwrap()
        .into_iter()
        .filter(|(key, _, _)| key.starts_with("backfill_telegram_"))
        .count();
    assert_eq!(backfills, 2);
}

#[test]
fn test_session_log_backfill_via_scanner_path() {
    let fixture = StateFixture::new();
    let backup_dir = fixture.state_dir.join("backup");
    fs::create_dir_all(&backup_dir).unwrap();
    fs::write(
        backup_dir.join("OLD.jsonl"),
        format!(
            "{}\n{}\n",
            user_line("CHILD", "GONE", "2024-01-01T00:00:00.000Z", "old message"),
            session_line("OLD", "2024-01-01T00:00:01.000Z"),
        ),
    )
    .unwrap();

    let mut archive = fixture.archive();
    let outcome = import_session_logs(&mut archive, &fixture.state_dir, &backup_dir).unwrap();
    // Out-of-order historical data lands despite the missing parent.
    assert_eq!(outcome.events.inserted, 2);
    assert_eq!(outcome.events.errors, 0);
}

#[test]
fn test_export_reingest_round_trip() {
    let fixture = StateFixture::new();
    fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &[
            session_line("AAA", "2026-02-13T12:00:00.000Z"),
            assistant_line("M", "AAA", "2026-02-13T12:00:01.000Z"),
        ],
    );

    let mut archive = fixture.archive();
    Scanner::new(&mut archive, &fixture.state_dir)
        .scan(ScanMode::Events, false, |_| {})
        .unwrap();

    let exported = archive.export_session_jsonl("AAA").unwrap();
    // Synthetic children are omitted from the export.
    assert_eq!(exported.lines().count(), 2);

    // Re-ingest the export into a fresh archive: the synthetic children
    // are re-synthesized and the event rows match.
    let replay_fixture = StateFixture::new();
    replay_fixture.write_log(
        "agents/main/sessions/AAA.jsonl",
        &exported.lines().map(str::to_string).collect::<Vec<_>>(),
    );

    let mut replay = Archive::open_in_memory().unwrap();
    Scanner::new(&mut replay, &replay_fixture.state_dir)
        .scan(ScanMode::Events, false, |_| {})
        .unwrap();

    let original: Vec<(String, i64)> = archive
        .session_events("AAA", &EventFilter::default())
        .unwrap()
        .into_iter()
        .map(|e| (e.event_id, e.timestamp))
        .collect();
    let replayed: Vec<(String, i64)> = replay
        .session_events("AAA", &EventFilter::default())
        .unwrap()
        .into_iter()
        .map(|e| (e.event_id, e.timestamp))
        .collect();
    assert_eq!(original, replayed);
}
