//! Local note store implementation

use crate::error::Result;
use crate::models::{Note, NoteId, NoteKind, SyncStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

const NOTE_COLUMNS: &str = "id, remote_id, content, kind, is_archived, sync_status, created_at, updated_at, base_remote_updated_at";

/// Trait for local note storage operations
pub trait NoteStore {
    /// Get a note by local ID
    fn get(&self, id: &NoteId) -> Result<Option<Note>>;

    /// Get a note by the identifier the remote store assigned
    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Note>>;

    /// List all notes, most recently updated first
    fn list(&self) -> Result<Vec<Note>>;

    /// List notes in the given sync state, most recently updated first
    fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Note>>;

    /// Insert or replace a note
    fn upsert(&self, note: &Note) -> Result<()>;

    /// Physically remove a note; returns whether a row was deleted
    fn delete(&self, id: &NoteId) -> Result<bool>;
}

/// `SQLite` implementation of `NoteStore`
pub struct SqliteNoteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteNoteStore<'a> {
    /// Create a new store with the given connection (or transaction)
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a note from a database row
    fn parse_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
        let id: String = row.get(0)?;
        let id = id.parse::<NoteId>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(error))
        })?;
        let kind: String = row.get(3)?;
        let kind = kind.parse::<NoteKind>().unwrap_or_else(|error| {
            tracing::warn!("Note {id} has {error}; treating it as a general note");
            NoteKind::General
        });

        Ok(Note {
            id,
            remote_id: row.get(1)?,
            content: row.get(2)?,
            kind,
            is_archived: row.get::<_, i64>(4)? != 0,
            sync_status: SyncStatus::from_code(row.get(5)?),
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            base_remote_updated_at: row.get(8)?,
        })
    }
}

impl NoteStore for SqliteNoteStore<'_> {
    fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
                params![id.as_str()],
                Self::parse_note,
            )
            .optional()?;
        Ok(note)
    }

    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE remote_id = ?"),
                params![remote_id],
                Self::parse_note,
            )
            .optional()?;
        Ok(note)
    }

    fn list(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY updated_at DESC, id DESC"
        ))?;

        let notes = stmt
            .query_map([], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE sync_status = ? ORDER BY updated_at DESC, id DESC"
        ))?;

        let notes = stmt
            .query_map(params![status.code()], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn upsert(&self, note: &Note) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notes (id, remote_id, content, kind, is_archived, sync_status, created_at, updated_at, base_remote_updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                remote_id = excluded.remote_id,
                content = excluded.content,
                kind = excluded.kind,
                is_archived = excluded.is_archived,
                sync_status = excluded.sync_status,
                updated_at = excluded.updated_at,
                base_remote_updated_at = excluded.base_remote_updated_at",
            params![
                note.id.as_str(),
                note.remote_id,
                note.content,
                note.kind.as_str(),
                i32::from(note.is_archived),
                note.sync_status.code(),
                note.created_at,
                note.updated_at,
                note.base_remote_updated_at,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &NoteId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }
}
