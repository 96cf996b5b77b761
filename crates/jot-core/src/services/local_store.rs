//! Shared handle to the local database.
//!
//! Every mutation runs inside one `SQLite` transaction while holding the
//! database mutex, so user edits and sync reconciliation never interleave.

use rusqlite::{Connection, Transaction};
use tokio::sync::{watch, Mutex};

use crate::db::{Database, NoteStore, SqliteNoteStore, SqliteSyncQueue};
use crate::models::Note;
use crate::Result;

/// Thread-safe local store with an observable note list
pub struct LocalStore {
    db: Mutex<Database>,
    notes_tx: watch::Sender<Vec<Note>>,
}

impl LocalStore {
    /// Wrap an opened database.
    ///
    /// Leases left behind by a previous process are released here, since no
    /// attempt can still be in flight for them.
    pub fn new(db: Database) -> Result<Self> {
        let released = SqliteSyncQueue::new(db.connection()).release_stale_leases()?;
        if released > 0 {
            tracing::info!("Released {released} stale sync queue lease(s)");
        }

        let notes = SqliteNoteStore::new(db.connection()).list()?;
        let (notes_tx, _notes_rx) = watch::channel(notes);
        Ok(Self {
            db: Mutex::new(db),
            notes_tx,
        })
    }

    /// Run a read-only closure against the database
    pub async fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.db.lock().await;
        f(db.connection())
    }

    /// Run `f` in a transaction and publish the resulting note list.
    ///
    /// The transaction rolls back if `f` returns an error.
    pub async fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;

        let notes = SqliteNoteStore::new(db.connection()).list()?;
        self.notes_tx.send_if_modified(|current| {
            if *current == notes {
                false
            } else {
                *current = notes;
                true
            }
        });
        Ok(value)
    }

    /// Current notes, most recently updated first
    pub fn snapshot(&self) -> Vec<Note> {
        self.notes_tx.borrow().clone()
    }

    /// Subscribe to note list changes
    pub fn subscribe(&self) -> watch::Receiver<Vec<Note>> {
        self.notes_tx.subscribe()
    }
}
