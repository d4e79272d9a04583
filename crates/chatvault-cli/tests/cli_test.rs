//! End-to-end coverage of the command surface against a synthetic state
//! directory, driven through the real binary.

use assert_cmd::Command;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct CliFixture {
    _temp: TempDir,
    state_dir: PathBuf,
}

impl CliFixture {
    fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let state_dir = temp.path().join("state");
        fs::create_dir_all(state_dir.join("agents/main/sessions")).unwrap();
        Self {
            _temp: temp,
            state_dir,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("chatvault").expect("binary builds");
        cmd.arg("--state-dir").arg(&self.state_dir);
        cmd
    }

    fn write_session_log(&self, name: &str) -> PathBuf {
        let path = self.state_dir.join("agents/main/sessions").join(name);
        let lines = [
            json!({"type": "session", "id": "AAA", "version": 3,
                   "timestamp": "2026-02-13T12:00:00.000Z", "cwd": "/x"})
            .to_string(),
            json!({"type": "message", "id": "U1", "parentId": "AAA",
                   "timestamp": "2026-02-13T12:00:01.000Z",
                   "message": {"role": "user", "content": "inspect the backlog"}})
            .to_string(),
            json!({"type": "message", "id": "M", "parentId": "U1",
                   "timestamp": "2026-02-13T12:00:02.000Z",
                   "message": {
                       "role": "assistant",
                       "model": "claude-sonnet-4",
                       "content": [
                           {"type": "text", "text": "Looking now."},
                           {"type": "toolCall", "id": "T1", "name": "exec", "arguments": {}}
                       ],
                       "usage": {"input": 10, "output": 5, "totalTokens": 15,
                                  "cost": {"total": 0.001}}
                   }})
            .to_string(),
        ];
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }
}

#[test]
fn test_scan_events_then_list_sessions() {
    let fixture = CliFixture::new();
    fixture.write_session_log("AAA.jsonl");

    fixture
        .command()
        .args(["scan", "--mode", "all"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Scan complete"));

    let output = fixture
        .command()
        .args(["sessions", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("AAA"), "missing session row: {}", stdout);
    assert!(stdout.contains("inspect the backlog"), "local title expected: {}", stdout);
}

#[test]
fn test_scan_missing_root_fails() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("chatvault").unwrap();
    cmd.arg("--state-dir")
        .arg(temp.path().join("does-not-exist"))
        .args(["scan", "--mode", "events"])
        .assert()
        .failure();
}

#[test]
fn test_export_jsonl_round_trips() {
    let fixture = CliFixture::new();
    fixture.write_session_log("AAA.jsonl");

    fixture
        .command()
        .args(["scan", "--mode", "events"])
        .assert()
        .success();

    let output = fixture
        .command()
        .args(["export", "AAA", "--format", "jsonl"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    // Synthetic children are omitted: session + user + assistant.
    assert_eq!(lines.len(), 3);
    for line in &lines {
        let value: serde_json::Value = serde_json::from_str(line).expect("valid JSONL line");
        assert!(value.get("id").is_some());
    }
}

#[test]
fn test_export_markdown_to_file() {
    let fixture = CliFixture::new();
    fixture.write_session_log("AAA.jsonl");
    fixture
        .command()
        .args(["scan", "--mode", "events"])
        .assert()
        .success();

    let out_path = fixture.state_dir.join("session.md");
    fixture
        .command()
        .args(["export", "AAA", "--format", "markdown", "--output"])
        .arg(&out_path)
        .assert()
        .success();

    let rendered = fs::read_to_string(&out_path).unwrap();
    assert!(rendered.contains("## Timeline"));
    assert!(rendered.contains("tool_call"));
}

#[test]
fn test_message_search_finds_scanned_turns() {
    let fixture = CliFixture::new();
    fixture.write_session_log("AAA.jsonl");
    fixture
        .command()
        .args(["scan", "--mode", "both"])
        .assert()
        .success();

    let output = fixture
        .command()
        .args(["messages", "search", "backlog"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("inspect the backlog"), "{}", stdout);
}

#[test]
fn test_import_telegram_and_list_messages() {
    let fixture = CliFixture::new();
    let export_path = fixture.state_dir.join("telegram.json");
    fs::write(
        &export_path,
        json!({
            "name": "Alice", "type": "personal_chat", "id": 7,
            "messages": [
                {"id": 1, "type": "message", "date": "2023-12-31T22:30:00",
                 "date_unixtime": "1704061800", "from": "Alice", "from_id": "user9",
                 "text": "happy new year"}
            ]
        })
        .to_string(),
    )
    .unwrap();

    fixture
        .command()
        .args(["import", "telegram"])
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicates::str::contains("1 inserted"));

    // Second import skips everything.
    fixture
        .command()
        .args(["import", "telegram"])
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicates::str::contains("0 inserted"));

    let output = fixture
        .command()
        .args(["messages", "list", "--channel", "telegram"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("happy new year"), "{}", stdout);
}

#[test]
fn test_checkpoint_list_shows_watermarks() {
    let fixture = CliFixture::new();
    fixture.write_session_log("AAA.jsonl");
    fixture
        .command()
        .args(["scan", "--mode", "events"])
        .assert()
        .success();

    fixture
        .command()
        .args(["checkpoint", "list"])
        .assert()
        .success()
        .stdout(predicates::str::contains("last_events_scan_timestamp"));
}

#[test]
fn test_context_window_renders_transcript() {
    let fixture = CliFixture::new();
    fixture.write_session_log("AAA.jsonl");
    fixture
        .command()
        .args(["scan", "--mode", "messages"])
        .assert()
        .success();

    let output = fixture
        .command()
        .args(["context", "0", "99999999999999"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("inspect the backlog"), "{}", stdout);
}

#[test]
fn test_db_vacuum_runs() {
    let fixture = CliFixture::new();
    fixture
        .command()
        .args(["db", "vacuum"])
        .assert()
        .success()
        .stdout(predicates::str::contains("vacuumed"));
}
