//! Database layer for Jot

mod conflict_store;
mod connection;
mod migrations;
mod note_store;
mod sync_queue;

pub use conflict_store::SqliteConflictStore;
pub use connection::Database;
pub use note_store::{NoteStore, SqliteNoteStore};
pub use sync_queue::SqliteSyncQueue;
