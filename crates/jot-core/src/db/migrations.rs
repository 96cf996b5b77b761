//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: notes and the sync queue
fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            remote_id INTEGER UNIQUE,
            content TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'general',
            is_archived INTEGER NOT NULL DEFAULT 0,
            sync_status INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            base_remote_updated_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_notes_sync_status ON notes(sync_status);

        -- One row per note: coalescing keeps a single pending intent
        CREATE TABLE IF NOT EXISTS sync_queue (
            sequence INTEGER PRIMARY KEY AUTOINCREMENT,
            note_id TEXT NOT NULL UNIQUE,
            operation TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            leased_at INTEGER,
            next_attempt_at INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_sync_queue_eligible ON sync_queue(leased_at, next_attempt_at);

        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: remote side of detected conflicts
fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            note_id TEXT PRIMARY KEY REFERENCES notes(id) ON DELETE CASCADE,
            remote_id INTEGER,
            remote_deleted INTEGER NOT NULL DEFAULT 0,
            remote_content TEXT,
            remote_kind TEXT,
            remote_is_archived INTEGER,
            remote_updated_at INTEGER,
            detected_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sync_conflicts_detected_at ON sync_conflicts(detected_at DESC);

        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
