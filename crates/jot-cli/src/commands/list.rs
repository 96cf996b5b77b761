use jot_core::models::{NoteKind, SyncStatus};
use jot_core::Note;

use crate::commands::common::{
    format_note_lines, note_to_list_item, open_repository, AppPaths, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    kind: Option<NoteKind>,
    include_archived: bool,
    as_json: bool,
    paths: &AppPaths,
) -> Result<(), CliError> {
    let repo = open_repository(paths)?;
    let notes = select_notes(repo.list().await?, limit, kind, include_archived);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Visible notes, newest first; deletions awaiting the server are hidden
pub fn select_notes(
    notes: Vec<Note>,
    limit: usize,
    kind: Option<NoteKind>,
    include_archived: bool,
) -> Vec<Note> {
    notes
        .into_iter()
        .filter(|note| note.sync_status != SyncStatus::PendingDelete)
        .filter(|note| include_archived || !note.is_archived)
        .filter(|note| kind.map_or(true, |kind| note.kind == kind))
        .take(limit)
        .collect()
}
