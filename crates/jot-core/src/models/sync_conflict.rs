//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::{NoteId, NoteKind};
use crate::remote::RemoteNote;

/// Remote side of an update rejected because the server row diverged.
///
/// The local side stays in the `notes` table untouched, so both versions
/// remain available until the user resolves the conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Note involved in the conflict
    pub note_id: NoteId,
    pub remote_id: Option<i64>,
    /// The remote row no longer exists
    pub remote_deleted: bool,
    pub remote_content: Option<String>,
    pub remote_kind: Option<NoteKind>,
    pub remote_is_archived: Option<bool>,
    /// Server `updated_at` of the diverged row, when the server reported it
    pub remote_updated_at: Option<i64>,
    /// Detection timestamp (unix ms)
    pub detected_at: i64,
}

impl SyncConflict {
    /// Conflict against a server version the client knows
    #[must_use]
    pub fn diverged(note_id: NoteId, remote_id: i64, current: Option<&RemoteNote>) -> Self {
        Self {
            note_id,
            remote_id: Some(remote_id),
            remote_deleted: false,
            remote_content: current.map(|remote| remote.content.clone()),
            remote_kind: current.map(|remote| remote.kind),
            remote_is_archived: current.map(|remote| remote.is_archived),
            remote_updated_at: current.map(|remote| remote.updated_at),
            detected_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Conflict against a remote row deleted by another client
    #[must_use]
    pub fn deleted_remotely(note_id: NoteId, remote_id: i64) -> Self {
        Self {
            note_id,
            remote_id: Some(remote_id),
            remote_deleted: true,
            remote_content: None,
            remote_kind: None,
            remote_is_archived: None,
            remote_updated_at: None,
            detected_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Full remote version, if the server reported one
    pub fn remote_note(&self) -> Option<RemoteNote> {
        Some(RemoteNote {
            id: self.remote_id?,
            content: self.remote_content.clone()?,
            kind: self.remote_kind.unwrap_or_default(),
            is_archived: self.remote_is_archived.unwrap_or(false),
            updated_at: self.remote_updated_at?,
        })
    }
}

/// User decision for a note in `Conflict`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Push the local version over the server's
    KeepLocal,
    /// Take the server's version and drop the local edit
    AcceptRemote,
    /// Push user-merged content
    Merge(String),
    /// Delete the note everywhere
    Discard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_note_requires_known_version() {
        let note_id = NoteId::new();
        let unknown = SyncConflict::diverged(note_id, 3, None);
        assert!(unknown.remote_note().is_none());

        let remote = RemoteNote {
            id: 3,
            content: "theirs".to_string(),
            kind: NoteKind::General,
            is_archived: false,
            updated_at: 99,
        };
        let known = SyncConflict::diverged(note_id, 3, Some(&remote));
        assert_eq!(known.remote_note(), Some(remote));
        assert!(!known.remote_deleted);
    }

    #[test]
    fn deleted_remotely_has_no_version() {
        let conflict = SyncConflict::deleted_remotely(NoteId::new(), 9);
        assert!(conflict.remote_deleted);
        assert!(conflict.remote_note().is_none());
    }
}
