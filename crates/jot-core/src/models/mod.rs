//! Data models for Jot

mod note;
mod sync_conflict;
mod sync_queue;

pub use note::{Note, NoteId, NoteKind, SyncStatus};
pub use sync_conflict::{ConflictResolution, SyncConflict};
pub use sync_queue::{EnqueueOutcome, QueueEntry, SyncOperation};
