use chatvault_store::{
    Archive, BatchOutcome, EventFilter, MessageFilter, SessionFilter,
};
use chatvault_types::{
    ArchiveEvent, Direction, EventKind, MessageRecord, SessionData, ThinkingPayload, UsagePayload,
};
use serde_json::json;

fn message(id: &str, sender: &str, timestamp: i64, text: &str) -> MessageRecord {
    let mut record = MessageRecord::new(id, "imported:test:export", "test", Direction::Inbound, timestamp);
    record.sender_id = Some(sender.to_string());
    record.sender_name = Some(sender.to_string());
    record.content_text = Some(text.to_string());
    record.raw = json!({"id": id, "text": text});
    record
}

fn event(id: &str, kind: EventKind, timestamp: i64) -> ArchiveEvent {
    ArchiveEvent::new(id, kind, timestamp, json!({"type": kind.as_str(), "id": id}))
}

#[test]
fn test_duplicate_by_message_id() {
    let archive = Archive::open_in_memory().unwrap();

    let first = message("m1", "alice", 1000, "hello");
    assert!(archive.insert_message(&first, true).unwrap().is_some());

    let mut same_id = message("m1", "bob", 9999999, "different text");
    same_id.sender_id = Some("bob".to_string());
    assert!(archive.insert_message(&same_id, true).unwrap().is_none());
}

#[test]
fn test_duplicate_by_fingerprint() {
    let archive = Archive::open_in_memory().unwrap();

    archive
        .insert_message(&message("m1", "alice", 1000, "hello"), true)
        .unwrap();

    // Different id, same sender/timestamp/content => same fingerprint.
    let dup = message("m2", "alice", 1000, "hello");
    assert!(archive.insert_message(&dup, true).unwrap().is_none());
}

#[test]
fn test_duplicate_by_timestamp_jitter() {
    let archive = Archive::open_in_memory().unwrap();

    archive
        .insert_message(&message("m1", "alice", 1000, "hello"), true)
        .unwrap();

    // Retry with jitter inside the 1000 ms window collapses.
    let jittered = message("m2", "alice", 1900, "hello");
    assert!(archive.insert_message(&jittered, true).unwrap().is_none());

    // Outside the window it is a distinct message.
    let later = message("m3", "alice", 2500, "hello");
    assert!(archive.insert_message(&later, true).unwrap().is_some());
}

#[test]
fn test_batch_insert_counts_duplicates_as_skipped() {
    let mut archive = Archive::open_in_memory().unwrap();

    let records = vec![
        message("m1", "alice", 1000, "one"),
        message("m2", "alice", 2000, "two"),
    ];
    let outcome = archive.insert_messages_batch(&records).unwrap();
    assert_eq!(
        outcome,
        BatchOutcome {
            inserted: 2,
            skipped: 0,
            errors: 0
        }
    );

    let outcome = archive.insert_messages_batch(&records).unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.skipped, 2);
}

#[test]
fn test_fts_liveness_across_update() {
    let mut archive = Archive::open_in_memory().unwrap();

    archive
        .insert_message(&message("m1", "alice", 1000, "the quick brown fox"), true)
        .unwrap();

    assert_eq!(archive.search("quick", 10).unwrap().len(), 1);

    archive.update_message("m1", "a lazy dog instead", 2000).unwrap();

    assert!(archive.search("quick", 10).unwrap().is_empty());
    let hits = archive.search("lazy", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.message_id, "m1");
}

#[test]
fn test_edit_then_soft_delete_round_trip() {
    let mut archive = Archive::open_in_memory().unwrap();

    archive
        .insert_message(&message("m1", "alice", 1000, "hello"), true)
        .unwrap();

    assert!(archive.update_message("m1", "hi", 2000).unwrap());
    assert!(archive.soft_delete_message("m1", 3000).unwrap());

    let hidden = archive.query_messages(&MessageFilter::default()).unwrap();
    assert!(hidden.is_empty());

    let visible = archive
        .query_messages(&MessageFilter {
            include_deleted: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(visible.len(), 1);
    let row = &visible[0].record;
    assert_eq!(row.content_text.as_deref(), Some("hi"));
    assert_eq!(row.edited_at, Some(2000));
    assert_eq!(row.deleted_at, Some(3000));

    let edits = archive.message_edits("m1").unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].previous_content.as_deref(), Some("hello"));
    assert_eq!(edits[0].edited_at, 2000);
}

#[test]
fn test_update_missing_message_is_silent() {
    let mut archive = Archive::open_in_memory().unwrap();
    assert!(!archive.update_message("ghost", "text", 1000).unwrap());
    assert!(archive.message_edits("ghost").unwrap().is_empty());
}

#[test]
fn test_reaction_lifecycle() {
    let archive = Archive::open_in_memory().unwrap();

    archive
        .insert_message(&message("m1", "alice", 1000, "hello"), true)
        .unwrap();

    archive.add_reaction("m1", "👍", "u1", Some("Bob")).unwrap();
    assert_eq!(archive.message_reactions("m1", true).unwrap().len(), 1);

    assert!(archive.remove_reaction("m1", "👍", "u1").unwrap());
    assert!(archive.message_reactions("m1", true).unwrap().is_empty());
    assert_eq!(archive.message_reactions("m1", false).unwrap().len(), 1);

    // Removing twice is a no-op.
    assert!(!archive.remove_reaction("m1", "👍", "u1").unwrap());

    // Re-adding clears removed_at.
    archive.add_reaction("m1", "👍", "u1", None).unwrap();
    let active = archive.message_reactions("m1", true).unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].removed_at.is_none());
}

#[test]
fn test_query_messages_filters() {
    let archive = Archive::open_in_memory().unwrap();

    let mut telegram = message("t1", "alice", 1000, "from telegram");
    telegram.channel = "telegram".to_string();
    archive.insert_message(&telegram, true).unwrap();

    let mut discord = message("d1", "bob", 2000, "from discord");
    discord.channel = "discord".to_string();
    archive.insert_message(&discord, true).unwrap();

    let by_channel = archive
        .query_messages(&MessageFilter {
            channel: Some("telegram".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_channel.len(), 1);
    assert_eq!(by_channel[0].record.message_id, "t1");

    let by_time = archive
        .query_messages(&MessageFilter {
            since: Some(1500),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_time.len(), 1);
    assert_eq!(by_time[0].record.message_id, "d1");

    // Ordering: timestamp DESC.
    let all = archive.query_messages(&MessageFilter::default()).unwrap();
    assert_eq!(all[0].record.message_id, "d1");
    assert_eq!(all[1].record.message_id, "t1");
}

#[test]
fn test_conversation_context_is_chronological() {
    let archive = Archive::open_in_memory().unwrap();

    archive
        .insert_message(&message("m1", "alice", 1000, "first"), true)
        .unwrap();
    archive
        .insert_message(&message("m2", "bob", 2000, "second"), true)
        .unwrap();

    let transcript = archive.conversation_context(0, 10_000, None).unwrap();
    let first_pos = transcript.find("first").unwrap();
    let second_pos = transcript.find("second").unwrap();
    assert!(first_pos < second_pos);
    assert!(transcript.contains("alice"));
}

#[test]
fn test_insert_single_event_with_skip() {
    let archive = Archive::open_in_memory().unwrap();

    let mut root = event("S1", EventKind::Session, 1000);
    root.session_id = Some("S1".to_string());

    assert!(archive
        .insert_event(&root, "agent:main:main", true)
        .unwrap()
        .is_some());
    assert!(archive
        .insert_event(&root, "agent:main:main", true)
        .unwrap()
        .is_none());

    let events = archive.session_events("S1", &EventFilter::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].session_key.as_deref(), Some("agent:main:main"));
}

#[test]
fn test_attachment_round_trip() {
    let archive = Archive::open_in_memory().unwrap();

    archive
        .insert_message(&message("m1", "alice", 1000, "see attached"), true)
        .unwrap();

    archive
        .add_attachment(&chatvault_types::AttachmentRecord {
            message_id: "m1".to_string(),
            attachment_type: "photo".to_string(),
            file_path: Some("photos/p.jpg".to_string()),
            url: None,
            file_name: Some("p.jpg".to_string()),
            size_bytes: Some(1024),
            mime_type: Some("image/jpeg".to_string()),
            thumbnail_path: None,
            metadata: Some(json!({"width": 640})),
            created_at: 1000,
        })
        .unwrap();

    let attachments = archive.message_attachments("m1").unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].file_name.as_deref(), Some("p.jpg"));
    assert_eq!(attachments[0].metadata.as_ref().unwrap()["width"], 640);
}

#[test]
fn test_event_batch_backfills_session_id() {
    let mut archive = Archive::open_in_memory().unwrap();

    let mut root = event("S1", EventKind::Session, 1000);
    root.session_id = Some("S1".to_string());
    let child = event("E1", EventKind::Message, 2000);

    let outcome = archive
        .insert_events_batch(&[root, child], "agent:main:main", None, false)
        .unwrap();
    assert_eq!(outcome.inserted, 2);

    let events = archive.session_events("S1", &EventFilter::default()).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.session_id.as_deref() == Some("S1")));
    assert!(events
        .iter()
        .all(|e| e.session_key.as_deref() == Some("agent:main:main")));
}

#[test]
fn test_event_batch_is_idempotent() {
    let mut archive = Archive::open_in_memory().unwrap();

    let mut root = event("S1", EventKind::Session, 1000);
    root.session_id = Some("S1".to_string());
    let batch = vec![root, event("E1", EventKind::Message, 2000)];

    let first = archive
        .insert_events_batch(&batch, "agent:main:main", None, false)
        .unwrap();
    assert_eq!(first.inserted, 2);

    let second = archive
        .insert_events_batch(&batch, "agent:main:main", None, false)
        .unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);
}

#[test]
fn test_orphan_child_dropped_without_force() {
    let mut archive = Archive::open_in_memory().unwrap();

    let mut orphan = event("M_tool_T1", EventKind::ToolCall, 2000);
    orphan.parent_event_id = Some("M".to_string());

    let outcome = archive
        .insert_events_batch(&[orphan], "agent:main:main", Some("S1"), false)
        .unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.errors, 1);
    assert!(archive.session_events("S1", &EventFilter::default()).unwrap().is_empty());
}

#[test]
fn test_orphan_child_inserted_under_force() {
    let mut archive = Archive::open_in_memory().unwrap();

    let mut orphan = event("M_tool_T1", EventKind::ToolCall, 2000);
    orphan.parent_event_id = Some("M".to_string());

    let outcome = archive
        .insert_events_batch(&[orphan], "agent:main:main", Some("S1"), true)
        .unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.errors, 0);

    // Enforcement is restored after the batch.
    let mut orphan2 = event("M_tool_T2", EventKind::ToolCall, 3000);
    orphan2.parent_event_id = Some("M".to_string());
    let outcome = archive
        .insert_events_batch(&[orphan2], "agent:main:main", Some("S1"), false)
        .unwrap();
    assert_eq!(outcome.errors, 1);
}

#[test]
fn test_satellite_rows_round_trip() {
    let mut archive = Archive::open_in_memory().unwrap();

    let mut root = event("S1", EventKind::Session, 1000);
    root.session_id = Some("S1".to_string());

    let mut parent = event("M", EventKind::Message, 2000);
    parent.role = Some("assistant".to_string());

    let mut thinking = event("M_thinking", EventKind::ThinkingBlock, 2000);
    thinking.parent_event_id = Some("M".to_string());
    thinking.thinking = Some(ThinkingPayload {
        content: "pondering the request".to_string(),
        signature: None,
    });

    let mut usage = event("M_usage", EventKind::UsageStats, 2000);
    usage.parent_event_id = Some("M".to_string());
    usage.usage = Some(UsagePayload {
        input_tokens: 100,
        output_tokens: 50,
        total_tokens: 150,
        total_cost: 0.003,
        ..Default::default()
    });

    let outcome = archive
        .insert_events_batch(&[root, parent, thinking, usage], "agent:main:main", None, false)
        .unwrap();
    assert_eq!(outcome.inserted, 4);
    assert_eq!(outcome.errors, 0);

    let events = archive.session_events("S1", &EventFilter::default()).unwrap();
    let thinking_row = events
        .iter()
        .find(|e| e.kind == EventKind::ThinkingBlock)
        .unwrap();
    assert_eq!(
        thinking_row.thinking.as_ref().unwrap().content,
        "pondering the request"
    );

    let usage_row = events.iter().find(|e| e.kind == EventKind::UsageStats).unwrap();
    assert_eq!(usage_row.usage.as_ref().unwrap().total_tokens, 150);

    let stats = archive.session_stats("S1").unwrap();
    assert_eq!(stats.total_events, 4);
    assert_eq!(stats.message_count, 1);
    assert_eq!(stats.total_tokens, 150);
    assert!((stats.total_cost - 0.003).abs() < 1e-9);
    assert_eq!(stats.start_time, Some(1000));
    assert_eq!(stats.end_time, Some(2000));
    assert!((stats.duration_seconds - 1.0).abs() < 1e-9);
}

#[test]
fn test_export_omits_synthetic_and_remaps_tool_result() {
    let mut archive = Archive::open_in_memory().unwrap();

    let mut root = ArchiveEvent::new(
        "S1",
        EventKind::Session,
        1000,
        json!({"type": "session", "id": "S1", "timestamp": "2026-02-13T12:00:00.000Z"}),
    );
    root.session_id = Some("S1".to_string());

    let parent = ArchiveEvent::new(
        "M",
        EventKind::Message,
        2000,
        json!({"type": "message", "id": "M", "message": {"role": "assistant"}}),
    );

    let mut tool = ArchiveEvent::new("M_tool_T1", EventKind::ToolCall, 2000, json!({}));
    tool.parent_event_id = Some("M".to_string());

    let result = ArchiveEvent::new(
        "R",
        EventKind::ToolResult,
        3000,
        json!({"type": "message", "id": "R", "message": {"role": "toolResult"}}),
    );

    archive
        .insert_events_batch(&[root, parent, tool, result], "agent:main:main", None, false)
        .unwrap();

    let jsonl = archive.export_session_jsonl("S1").unwrap();
    let lines: Vec<&str> = jsonl.lines().collect();
    assert_eq!(lines.len(), 3);

    let ids: Vec<String> = lines
        .iter()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["id"]
            .as_str()
            .unwrap_or("")
            .to_string())
        .collect();
    assert_eq!(ids, vec!["S1", "M", "R"]);

    let last: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(last["type"], "message");
}

#[test]
fn test_session_upsert_and_search() {
    let archive = Archive::open_in_memory().unwrap();

    let mut session = SessionData::new("S1");
    session.session_key = Some("agent:main:main".to_string());
    session.title = Some("Database schema design".to_string());
    session.summary = Some("Explored archival schema options.".to_string());
    session.started_at = Some(1000);

    assert!(archive.upsert_session(&session).unwrap());
    assert!(!archive.upsert_session(&session).unwrap());

    // COALESCE keeps the existing title when the update carries none.
    let mut update = SessionData::new("S1");
    update.session_key = Some("agent:main:main".to_string());
    update.started_at = Some(1000);
    archive.upsert_session(&update).unwrap();

    let row = archive.get_session("S1").unwrap().unwrap();
    assert_eq!(row.title.as_deref(), Some("Database schema design"));

    let hits = archive.search_sessions("schema", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "S1");

    let listed = archive.query_sessions(&SessionFilter::default()).unwrap();
    assert_eq!(listed.len(), 1);
}

#[test]
fn test_find_session_by_prefix() {
    let archive = Archive::open_in_memory().unwrap();

    archive.upsert_session(&SessionData::new("abc-123")).unwrap();
    archive.upsert_session(&SessionData::new("abd-456")).unwrap();

    assert_eq!(
        archive.find_session_by_prefix("abc").unwrap(),
        Some("abc-123".to_string())
    );
    assert!(archive.find_session_by_prefix("zzz").unwrap().is_none());
    assert!(archive.find_session_by_prefix("ab").is_err());
}

#[test]
fn test_checkpoints() {
    let archive = Archive::open_in_memory().unwrap();

    assert!(archive.checkpoint("last_scan_timestamp").unwrap().is_none());
    assert_eq!(archive.watermark("last_scan_timestamp").unwrap(), 0);

    archive.set_checkpoint("last_scan_timestamp", "1700000000000").unwrap();
    assert_eq!(
        archive.watermark("last_scan_timestamp").unwrap(),
        1700000000000
    );

    archive.set_checkpoint("last_scan_timestamp", "1700000005000").unwrap();
    assert_eq!(
        archive.watermark("last_scan_timestamp").unwrap(),
        1700000005000
    );

    let entries = archive.list_checkpoints().unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_open_on_disk_and_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("archive").join("chatvault.db");

    {
        let archive = Archive::open(&path).unwrap();
        archive
            .insert_message(&message("m1", "alice", 1000, "persisted"), true)
            .unwrap();
    }

    let archive = Archive::open(&path).unwrap();
    let rows = archive.query_messages(&MessageFilter::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.content_text.as_deref(), Some("persisted"));
}
