//! Sync queue entry model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::NoteId;

/// Mutation intent waiting for remote confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    /// Stable storage name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown sync operation '{other}'")),
        }
    }
}

/// A pending operation in the durable sync queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Insertion order; defines drain order and never changes on coalescing
    pub sequence: i64,
    pub note_id: NoteId,
    pub operation: SyncOperation,
    /// Failed attempts so far
    pub attempts: u32,
    /// Bumped every time a local edit is coalesced into this entry
    pub revision: i64,
    /// Enqueue timestamp (Unix ms)
    pub created_at: i64,
    /// Set while a drain holds the entry in flight
    pub leased_at: Option<i64>,
    /// Earliest time (Unix ms) an automatic drain may retry the entry
    pub next_attempt_at: i64,
}

impl QueueEntry {
    /// Whether the entry is currently claimed by a drain
    pub const fn is_leased(&self) -> bool {
        self.leased_at.is_some()
    }

    /// Whether automatic retries gave up on this entry
    pub const fn needs_attention(&self, max_attempts: u32) -> bool {
        self.attempts > max_attempts
    }
}

/// What happened to the queue when a new operation was enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new entry was appended
    Enqueued { sequence: i64 },
    /// Merged into the existing entry, which now carries `operation`
    Coalesced {
        sequence: i64,
        operation: SyncOperation,
    },
    /// A never-sent create was cancelled by a delete; nothing remains queued
    Cancelled,
}
