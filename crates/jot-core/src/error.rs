//! Error types for jot-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using jot-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jot-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// The note already has a pending delete; further mutations are rejected
    #[error("Note is pending deletion: {0}")]
    NoteDeleted(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote note API error surfaced outside a drain (e.g. a pull)
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
