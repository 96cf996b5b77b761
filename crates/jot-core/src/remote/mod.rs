//! Remote note API seam.
//!
//! The sync engine only talks to the remote store through [`RemoteNoteClient`].
//! [`HttpNoteClient`] is the production implementation.

mod http;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Note, NoteKind};

pub use http::HttpNoteClient;

/// A note as the remote store knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNote {
    /// Server-assigned identifier
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub kind: NoteKind,
    #[serde(default)]
    pub is_archived: bool,
    /// Server modification timestamp (Unix ms)
    pub updated_at: i64,
}

/// Note body sent on create / update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    pub content: String,
    pub kind: NoteKind,
    pub is_archived: bool,
}

impl From<&Note> for NotePayload {
    fn from(note: &Note) -> Self {
        Self {
            content: note.content.clone(),
            kind: note.kind,
            is_archived: note.is_archived,
        }
    }
}

/// Filter for listing remote notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFilter {
    pub include_archived: bool,
    pub kind: Option<NoteKind>,
    /// Only notes modified after this timestamp (Unix ms)
    pub updated_since: Option<i64>,
}

impl NoteFilter {
    /// Whether the filter selects every remote note
    pub const fn is_complete(&self) -> bool {
        self.include_archived && self.kind.is_none() && self.updated_since.is_none()
    }
}

impl Default for NoteFilter {
    fn default() -> Self {
        Self {
            include_archived: true,
            kind: None,
            updated_since: None,
        }
    }
}

/// Failures reported by the remote note API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The addressed remote note does not exist
    #[error("remote note not found")]
    NotFound,

    /// The server row changed since the version the edit was based on
    #[error("remote note was modified since the local edit's base version")]
    PreconditionFailed {
        /// Server's current version, when the server reports it
        current: Option<Box<RemoteNote>>,
    },

    /// Network failure, timeout, or server-side error; safe to retry
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// Credentials missing, expired or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The server refused the request for a reason retrying will not fix
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Whether this failure is a plain network/server hiccup
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Remote note API consumed by the sync engine.
///
/// Implementations own transport, auth and serialization. They must report a
/// stale `base_updated_at` on update as [`RemoteError::PreconditionFailed`].
#[async_trait]
pub trait RemoteNoteClient: Send + Sync {
    /// List remote notes matching `filter`
    async fn list(&self, filter: &NoteFilter) -> Result<Vec<RemoteNote>, RemoteError>;

    /// Create a note; returns the server's copy with its assigned id
    async fn create(&self, note: &NotePayload) -> Result<RemoteNote, RemoteError>;

    /// Update a note, conditional on the server row still being at
    /// `base_updated_at`; `None` overwrites unconditionally
    async fn update(
        &self,
        remote_id: i64,
        note: &NotePayload,
        base_updated_at: Option<i64>,
    ) -> Result<RemoteNote, RemoteError>;

    /// Delete a note
    async fn delete(&self, remote_id: i64) -> Result<(), RemoteError>;
}
