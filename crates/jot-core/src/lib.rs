//! jot-core - Core library for Jot
//!
//! This crate contains the offline-first sync engine shared by all Jot
//! interfaces: the local note store, the durable sync queue, the drain and
//! retry loop, conflict detection and the repository facade clients talk to.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Note, NoteId};
