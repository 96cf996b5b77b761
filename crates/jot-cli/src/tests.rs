use std::collections::HashSet;

use clap::Parser;
use jot_core::models::{ConflictResolution, NoteKind, QueueEntry, SyncOperation, SyncStatus};
use jot_core::sync::DrainReport;
use jot_core::Note;
use tempfile::TempDir;

use super::*;
use crate::commands::common::{
    format_queue_lines, format_relative_time, match_note_prefix, normalize_content,
    normalize_note_identifier, note_preview, open_repository, resolve_note,
};
use crate::commands::list::select_notes;
use crate::commands::sync::summarize_report;

fn note_with_id(id: &str, content: &str) -> Note {
    let mut note = Note::new(content, NoteKind::General);
    note.id = id.parse().unwrap();
    note
}

fn temp_paths() -> (TempDir, AppPaths) {
    let dir = TempDir::new().unwrap();
    let paths = AppPaths {
        db_path: dir.path().join("data").join("jot.db"),
        config_path: dir.path().join("config.json"),
    };
    (dir, paths)
}

#[test]
fn normalize_note_identifier_rejects_empty() {
    assert!(matches!(
        normalize_note_identifier(" \n "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(
        normalize_note_identifier("  abc123  ").unwrap(),
        "abc123".to_string()
    );
}

#[test]
fn normalize_content_trims_and_rejects_blank() {
    assert_eq!(normalize_content("  hello \n"), Some("hello".to_string()));
    assert_eq!(normalize_content(" \t\n"), None);
}

#[test]
fn note_preview_collapses_whitespace_and_truncates() {
    assert_eq!(note_preview("  first   line \nsecond", 40), "first line");
    assert_eq!(note_preview("abcdefghijkl", 8), "abcde...");
    assert_eq!(note_preview("", 8), "");
}

#[test]
fn format_relative_time_uses_compact_units() {
    let now = 1_700_000_000_000;
    assert_eq!(format_relative_time(now - 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
    assert_eq!(format_relative_time(now + 10_000, now), "just now");
}

#[test]
fn match_note_prefix_resolves_unique_prefix() {
    let notes = vec![
        note_with_id("11111111-1111-7111-8111-111111111111", "Note A"),
        note_with_id("11111111-1111-7111-8111-222222222222", "Note B"),
    ];

    let note = match_note_prefix(&notes, "11111111-1111-7111-8111-2").unwrap();
    assert_eq!(note.content, "Note B");
}

#[test]
fn match_note_prefix_rejects_ambiguous_and_missing() {
    let notes = vec![
        note_with_id("aaaaaaaa-aaaa-7aaa-8aaa-aaaaaaaaaaaa", "Left"),
        note_with_id("aaaaaaaa-aaaa-7aaa-8aaa-bbbbbbbbbbbb", "Right"),
    ];

    assert!(matches!(
        match_note_prefix(&notes, "AAAAAAAA"),
        Err(CliError::AmbiguousNoteId(_))
    ));
    assert!(matches!(
        match_note_prefix(&notes, "ffff"),
        Err(CliError::NoteNotFound(_))
    ));
}

#[test]
fn select_notes_hides_pending_deletes_and_archived() {
    let visible = note_with_id("11111111-1111-7111-8111-111111111111", "visible");
    let mut archived = note_with_id("11111111-1111-7111-8111-222222222222", "archived");
    archived.is_archived = true;
    let mut deleting = note_with_id("11111111-1111-7111-8111-333333333333", "deleting");
    deleting.sync_status = SyncStatus::PendingDelete;
    let mut task = note_with_id("11111111-1111-7111-8111-444444444444", "task");
    task.kind = NoteKind::Task;
    let notes = vec![visible, archived, deleting, task];

    let shown = select_notes(notes.clone(), 10, None, false);
    let contents = shown.iter().map(|n| n.content.as_str()).collect::<Vec<_>>();
    assert_eq!(contents, vec!["visible", "task"]);

    let with_archived = select_notes(notes.clone(), 10, None, true);
    assert_eq!(with_archived.len(), 3);

    let tasks = select_notes(notes.clone(), 10, Some(NoteKind::Task), false);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].content, "task");

    assert_eq!(select_notes(notes, 1, None, true).len(), 1);
}

#[test]
fn resolve_command_requires_exactly_one_decision() {
    let cli = Cli::try_parse_from(["jot", "resolve", "abc", "--merge", "both sides"]).unwrap();
    let Some(Commands::Resolve { id, decision }) = cli.command else {
        panic!("expected resolve command");
    };
    assert_eq!(id, "abc");
    assert_eq!(
        decision.resolution(),
        ConflictResolution::Merge("both sides".to_string())
    );

    assert!(Cli::try_parse_from(["jot", "resolve", "abc"]).is_err());
    assert!(Cli::try_parse_from(["jot", "resolve", "abc", "--keep-local", "--discard"]).is_err());
}

#[test]
fn bare_words_parse_as_quick_capture() {
    let cli = Cli::try_parse_from(["jot", "buy", "milk"]).unwrap();
    assert!(cli.command.is_none());
    assert_eq!(cli.note, vec!["buy".to_string(), "milk".to_string()]);
}

#[test]
fn summarize_report_mentions_follow_ups() {
    let clean = DrainReport {
        completed: 3,
        pulled: 1,
        ..DrainReport::default()
    };
    assert_eq!(
        summarize_report(&clean),
        vec!["Sync completed: 3 pushed, 1 pulled".to_string()]
    );

    let messy = DrainReport {
        completed: 1,
        conflicts: 1,
        failed: 2,
        needs_attention: 1,
        ..DrainReport::default()
    };
    let lines = summarize_report(&messy);
    assert_eq!(lines.len(), 4);
    assert!(lines[1].contains("jot conflicts"));
    assert!(lines[2].contains("jot queue"));

    let offline = DrainReport {
        interrupted: true,
        ..DrainReport::default()
    };
    assert!(summarize_report(&offline)[0].starts_with("Sync interrupted"));
}

#[test]
fn format_queue_lines_flags_exhausted_entries() {
    let entry = QueueEntry {
        sequence: 7,
        note_id: "11111111-1111-7111-8111-111111111111".parse().unwrap(),
        operation: SyncOperation::Update,
        attempts: 6,
        revision: 1,
        created_at: 0,
        leased_at: None,
        next_attempt_at: 0,
    };

    let lines = format_queue_lines(std::slice::from_ref(&entry), &HashSet::from([7]));
    assert!(lines[0].starts_with("#7"));
    assert!(lines[0].contains("update"));
    assert!(lines[0].contains("needs attention"));

    let lines = format_queue_lines(&[entry], &HashSet::new());
    assert!(lines[0].ends_with("ready"));
}

#[tokio::test(flavor = "current_thread")]
async fn run_add_stores_note_and_queues_create() {
    let (_dir, paths) = temp_paths();

    run_add(&["Milk".to_string(), "and eggs".to_string()], NoteKind::Task, &paths)
        .await
        .unwrap();

    let repo = open_repository(&paths).unwrap();
    let notes = repo.list().await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "Milk and eggs");
    assert_eq!(notes[0].kind, NoteKind::Task);
    assert_eq!(notes[0].sync_status, SyncStatus::PendingCreate);

    let entries = repo.pending_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, SyncOperation::Create);
}

#[tokio::test(flavor = "current_thread")]
async fn run_edit_and_archive_update_local_note() {
    let (_dir, paths) = temp_paths();
    let id = {
        let repo = open_repository(&paths).unwrap();
        repo.create("draft", NoteKind::General).await.unwrap()
    };
    let prefix = id.to_string().chars().take(18).collect::<String>();

    run_edit(&prefix, &["final".to_string()], &paths)
        .await
        .unwrap();
    run_archive(&prefix, true, &paths).await.unwrap();

    let repo = open_repository(&paths).unwrap();
    let note = resolve_note(&id.to_string(), &repo).await.unwrap();
    assert_eq!(note.content, "final");
    assert!(note.is_archived);
    assert_eq!(note.sync_status, SyncStatus::PendingCreate);
    assert_eq!(repo.pending_entries().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn run_delete_drops_unsent_note_entirely() {
    let (_dir, paths) = temp_paths();
    let id = {
        let repo = open_repository(&paths).unwrap();
        repo.create("never sent", NoteKind::General).await.unwrap()
    };

    run_delete(&id.to_string(), &paths).await.unwrap();

    let repo = open_repository(&paths).unwrap();
    assert!(repo.get(&id).await.unwrap().is_none());
    assert!(repo.pending_entries().await.unwrap().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn run_resolve_rejects_note_without_conflict() {
    let (_dir, paths) = temp_paths();
    let id = {
        let repo = open_repository(&paths).unwrap();
        repo.create("calm", NoteKind::General).await.unwrap()
    };

    let error = run_resolve(&id.to_string(), ConflictResolution::KeepLocal, &paths)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::NoConflict(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn run_sync_requires_sync_configuration() {
    let (_dir, paths) = temp_paths();

    let error = run_sync(&paths).await.unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));
}

#[tokio::test(flavor = "current_thread")]
async fn open_repository_rejects_invalid_config() {
    let (_dir, paths) = temp_paths();
    std::fs::write(&paths.config_path, r#"{"sync": {"request_timeout_ms": 0}}"#).unwrap();

    let Err(error) = open_repository(&paths) else {
        panic!("expected open_repository to fail");
    };
    assert!(matches!(error, CliError::Core(_)));
}
