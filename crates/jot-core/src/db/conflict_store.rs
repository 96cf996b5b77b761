//! Storage for the remote side of unresolved conflicts

use crate::error::Result;
use crate::models::{NoteId, NoteKind, SyncConflict};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

const CONFLICT_COLUMNS: &str = "note_id, remote_id, remote_deleted, remote_content, remote_kind, remote_is_archived, remote_updated_at, detected_at";

/// `SQLite`-backed conflict records, one per conflicted note
pub struct SqliteConflictStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConflictStore<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncConflict> {
        let note_id: String = row.get(0)?;
        let note_id = note_id.parse::<NoteId>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(error))
        })?;
        let remote_kind: Option<String> = row.get(4)?;

        Ok(SyncConflict {
            note_id,
            remote_id: row.get(1)?,
            remote_deleted: row.get::<_, i64>(2)? != 0,
            remote_content: row.get(3)?,
            remote_kind: remote_kind.and_then(|kind| kind.parse::<NoteKind>().ok()),
            remote_is_archived: row.get::<_, Option<i64>>(5)?.map(|flag| flag != 0),
            remote_updated_at: row.get(6)?,
            detected_at: row.get(7)?,
        })
    }

    /// Store a conflict, replacing any earlier record for the same note
    pub fn record(&self, conflict: &SyncConflict) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO sync_conflicts ({CONFLICT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                conflict.note_id.as_str(),
                conflict.remote_id,
                i32::from(conflict.remote_deleted),
                conflict.remote_content,
                conflict.remote_kind.map(NoteKind::as_str),
                conflict.remote_is_archived.map(i32::from),
                conflict.remote_updated_at,
                conflict.detected_at,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, note_id: &NoteId) -> Result<Option<SyncConflict>> {
        let conflict = self
            .conn
            .query_row(
                &format!("SELECT {CONFLICT_COLUMNS} FROM sync_conflicts WHERE note_id = ?"),
                params![note_id.as_str()],
                Self::parse_conflict,
            )
            .optional()?;
        Ok(conflict)
    }

    /// Unresolved conflicts, most recently detected first
    pub fn list(&self) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONFLICT_COLUMNS} FROM sync_conflicts ORDER BY detected_at DESC, note_id"
        ))?;
        let conflicts = stmt
            .query_map([], Self::parse_conflict)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conflicts)
    }

    pub fn remove(&self, note_id: &NoteId) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM sync_conflicts WHERE note_id = ?",
            params![note_id.as_str()],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NoteStore, SqliteNoteStore};
    use crate::models::Note;
    use crate::remote::RemoteNote;
    use pretty_assertions::assert_eq;

    fn stored_note(db: &Database) -> Note {
        let note = Note::new("local", NoteKind::General);
        SqliteNoteStore::new(db.connection()).upsert(&note).unwrap();
        note
    }

    #[test]
    fn test_record_and_get() {
        let db = Database::open_in_memory().unwrap();
        let note = stored_note(&db);
        let store = SqliteConflictStore::new(db.connection());

        let remote = RemoteNote {
            id: 4,
            content: "theirs".to_string(),
            kind: NoteKind::Task,
            is_archived: true,
            updated_at: 50,
        };
        let conflict = SyncConflict::diverged(note.id, 4, Some(&remote));
        store.record(&conflict).unwrap();

        assert_eq!(store.get(&note.id).unwrap(), Some(conflict));
    }

    #[test]
    fn test_record_replaces_previous() {
        let db = Database::open_in_memory().unwrap();
        let note = stored_note(&db);
        let store = SqliteConflictStore::new(db.connection());

        store
            .record(&SyncConflict::diverged(note.id, 4, None))
            .unwrap();
        store
            .record(&SyncConflict::deleted_remotely(note.id, 4))
            .unwrap();

        let conflicts = store.list().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].remote_deleted);
    }

    #[test]
    fn test_removed_with_note() {
        let db = Database::open_in_memory().unwrap();
        let note = stored_note(&db);
        let store = SqliteConflictStore::new(db.connection());
        store
            .record(&SyncConflict::diverged(note.id, 4, None))
            .unwrap();

        SqliteNoteStore::new(db.connection()).delete(&note.id).unwrap();

        assert!(store.get(&note.id).unwrap().is_none());
        assert!(!store.remove(&note.id).unwrap());
    }
}
