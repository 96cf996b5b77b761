//! Note model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::remote::RemoteNote;

/// A stable client-generated note identifier, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The closed set of note kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// A regular note
    #[default]
    General,
    /// A quick capture from the capture hotkey / widget
    QuickCapture,
    /// A task
    Task,
}

impl NoteKind {
    /// Stable storage / wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::QuickCapture => "quick_capture",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "note" => Ok(Self::General),
            "quick_capture" | "quick-capture" | "capture" => Ok(Self::QuickCapture),
            "task" | "todo" => Ok(Self::Task),
            other => Err(format!("unknown note kind '{other}'")),
        }
    }
}

/// Sync state of a local note relative to the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    #[default]
    Synced,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
    Conflict,
}

impl SyncStatus {
    /// Integer code persisted in the `notes.sync_status` column
    pub const fn code(self) -> i64 {
        match self {
            Self::Synced => 0,
            Self::PendingCreate => 1,
            Self::PendingUpdate => 2,
            Self::PendingDelete => 3,
            Self::Conflict => 4,
        }
    }

    /// Decode a persisted status code.
    ///
    /// Missing or unknown codes decode to `Synced` instead of failing the
    /// read. Unknown codes are logged since they usually mean the database
    /// was written by a newer schema.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) | None => Self::Synced,
            Some(1) => Self::PendingCreate,
            Some(2) => Self::PendingUpdate,
            Some(3) => Self::PendingDelete,
            Some(4) => Self::Conflict,
            Some(other) => {
                tracing::warn!("Unknown sync status code {other}; treating note as synced");
                Self::Synced
            }
        }
    }

    /// Whether a local mutation is still waiting for remote confirmation
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::PendingCreate | Self::PendingUpdate | Self::PendingDelete
        )
    }

    /// Short label for sync indicators
    pub const fn label(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::PendingCreate => "pending-create",
            Self::PendingUpdate => "pending-update",
            Self::PendingDelete => "pending-delete",
            Self::Conflict => "conflict",
        }
    }
}

/// A note in the local store, with its sync metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Client-generated identifier, never reused
    pub id: NoteId,
    /// Identifier assigned by the remote store once a create succeeds
    pub remote_id: Option<i64>,
    /// Plain text content
    pub content: String,
    pub kind: NoteKind,
    pub is_archived: bool,
    pub sync_status: SyncStatus,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last known modification timestamp (Unix ms), local or remote-confirmed
    pub updated_at: i64,
    /// Remote `updated_at` the local edit was based on
    pub base_remote_updated_at: Option<i64>,
}

impl Note {
    /// Create a new local-only note awaiting its first sync
    #[must_use]
    pub fn new(content: impl Into<String>, kind: NoteKind) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: NoteId::new(),
            remote_id: None,
            content: content.into(),
            kind,
            is_archived: false,
            sync_status: SyncStatus::PendingCreate,
            created_at: now,
            updated_at: now,
            base_remote_updated_at: None,
        }
    }

    /// Build a synced local row for a note first seen on the remote
    #[must_use]
    pub fn from_remote(remote: &RemoteNote) -> Self {
        Self {
            id: NoteId::new(),
            remote_id: Some(remote.id),
            content: remote.content.clone(),
            kind: remote.kind,
            is_archived: remote.is_archived,
            sync_status: SyncStatus::Synced,
            created_at: remote.updated_at,
            updated_at: remote.updated_at,
            base_remote_updated_at: Some(remote.updated_at),
        }
    }

    /// Overwrite the local payload with a remote version and mark it synced
    pub fn apply_remote(&mut self, remote: &RemoteNote) {
        self.remote_id = Some(remote.id);
        self.content.clone_from(&remote.content);
        self.kind = remote.kind;
        self.is_archived = remote.is_archived;
        self.updated_at = remote.updated_at;
        self.base_remote_updated_at = Some(remote.updated_at);
        self.sync_status = SyncStatus::Synced;
    }

    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }

    /// Check if note content is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
