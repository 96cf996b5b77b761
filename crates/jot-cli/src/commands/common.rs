use std::collections::HashSet;
use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use jot_core::config::ClientConfig;
use jot_core::connectivity::ConnectivityMonitor;
use jot_core::db::Database;
use jot_core::models::{QueueEntry, SyncConflict, SyncStatus};
use jot_core::services::OfflineNoteRepository;
use jot_core::{Note, NoteId};
use serde::Serialize;

use crate::error::CliError;

/// Where the CLI keeps its database and reads its config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn resolve(
        cli_db_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        Ok(Self {
            db_path: resolve_db_path(cli_db_path)?,
            config_path: resolve_config_path(cli_config_path)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub remote_id: Option<i64>,
    pub preview: String,
    pub content: String,
    pub kind: String,
    pub archived: bool,
    pub sync_status: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub note_id: String,
    pub remote_id: Option<i64>,
    pub local_preview: Option<String>,
    pub remote_deleted: bool,
    pub remote_content: Option<String>,
    pub remote_updated_at: Option<i64>,
    pub detected_at: i64,
    pub detected_at_iso: String,
}

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub sequence: i64,
    pub note_id: String,
    pub operation: String,
    pub attempts: u32,
    pub in_flight: bool,
    pub needs_attention: bool,
    pub next_attempt_at: i64,
}

pub fn open_repository(paths: &AppPaths) -> Result<OfflineNoteRepository, CliError> {
    if let Some(parent) = paths.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let config = ClientConfig::load(&paths.config_path)?.with_env_overrides();
    let db = Database::open(&paths.db_path)?;
    Ok(OfflineNoteRepository::open(
        db,
        &config,
        ConnectivityMonitor::new(true),
    )?)
}

/// Look a note up by full id or unique id prefix
pub async fn resolve_note(
    note_query: &str,
    repo: &OfflineNoteRepository,
) -> Result<Note, CliError> {
    let note_query = normalize_note_identifier(note_query)?;

    if let Ok(note_id) = note_query.parse::<NoteId>() {
        if let Some(note) = repo.get(&note_id).await? {
            return Ok(note);
        }
    }

    let notes = repo.list().await?;
    match_note_prefix(&notes, &note_query).cloned()
}

pub fn match_note_prefix<'a>(notes: &'a [Note], prefix: &str) -> Result<&'a Note, CliError> {
    let prefix = prefix.to_ascii_lowercase();
    let matches = notes
        .iter()
        .filter(|note| note.id.to_string().starts_with(&prefix))
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Err(CliError::NoteNotFound(prefix)),
        [note] => Ok(note),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|note| short_id(&note.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{prefix}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &NoteId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(&note.id);
            let preview = note_preview(&note.content, 40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            let marker = note_marker(note);

            if marker.is_empty() {
                format!("{short_id:<13}  {preview:<40}  {relative_time}")
            } else {
                format!("{short_id:<13}  {preview:<40}  {relative_time:<10}  {marker}")
            }
        })
        .collect()
}

fn note_marker(note: &Note) -> String {
    let mut flags = Vec::new();
    if note.sync_status != SyncStatus::Synced {
        flags.push(format!("[{}]", note.sync_status.label()));
    }
    if note.is_archived {
        flags.push("[archived]".to_string());
    }
    flags.join(" ")
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();

    NoteListItem {
        id: note.id.to_string(),
        remote_id: note.remote_id,
        preview: note_preview(&note.content, 80),
        content: note.content.clone(),
        kind: note.kind.to_string(),
        archived: note.is_archived,
        sync_status: note.sync_status.label().to_string(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
    }
}

pub fn conflict_to_item(conflict: &SyncConflict, local: Option<&Note>) -> ConflictItem {
    ConflictItem {
        note_id: conflict.note_id.to_string(),
        remote_id: conflict.remote_id,
        local_preview: local.map(|note| note_preview(&note.content, 80)),
        remote_deleted: conflict.remote_deleted,
        remote_content: conflict.remote_content.clone(),
        remote_updated_at: conflict.remote_updated_at,
        detected_at: conflict.detected_at,
        detected_at_iso: format_timestamp(conflict.detected_at),
    }
}

pub fn format_conflict_lines(conflicts: &[(SyncConflict, Option<Note>)]) -> Vec<String> {
    conflicts
        .iter()
        .map(|(conflict, local)| {
            let local_preview = local
                .as_ref()
                .map_or_else(String::new, |note| note_preview(&note.content, 30));
            let remote_preview = if conflict.remote_deleted {
                "<deleted on server>".to_string()
            } else {
                conflict.remote_content.as_deref().map_or_else(
                    || "<unknown server version>".to_string(),
                    |content| note_preview(content, 30),
                )
            };

            format!(
                "{:<13}  local: {local_preview:<30}  server: {remote_preview:<30}  {}",
                short_id(&conflict.note_id),
                format_timestamp(conflict.detected_at)
            )
        })
        .collect()
}

pub fn queue_to_item(entry: &QueueEntry, exhausted: &HashSet<i64>) -> QueueItem {
    QueueItem {
        sequence: entry.sequence,
        note_id: entry.note_id.to_string(),
        operation: entry.operation.as_str().to_string(),
        attempts: entry.attempts,
        in_flight: entry.is_leased(),
        needs_attention: exhausted.contains(&entry.sequence),
        next_attempt_at: entry.next_attempt_at,
    }
}

pub fn format_queue_lines(entries: &[QueueEntry], exhausted: &HashSet<i64>) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let state = if entry.is_leased() {
                "in flight".to_string()
            } else if exhausted.contains(&entry.sequence) {
                "needs attention (run `jot sync`)".to_string()
            } else if entry.next_attempt_at > now_ms {
                format!("retry at {}", format_timestamp(entry.next_attempt_at))
            } else {
                "ready".to_string()
            };

            format!(
                "#{:<5} {:<6}  {:<13}  attempts={}  {state}",
                entry.sequence,
                entry.operation.as_str(),
                short_id(&entry.note_id),
                entry.attempts
            )
        })
        .collect()
}

pub fn note_preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("jot-note-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("JOT_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }

    dirs::data_dir()
        .map(|dir| dir.join("jot").join("jot.db"))
        .ok_or_else(|| CliError::Config("failed to resolve data directory".to_string()))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_config_path.or_else(|| env::var_os("JOT_CONFIG").map(PathBuf::from)) {
        return Ok(path);
    }

    dirs::config_dir()
        .map(|dir| dir.join("jot").join("config.json"))
        .ok_or_else(|| CliError::Config("failed to resolve config directory".to_string()))
}
