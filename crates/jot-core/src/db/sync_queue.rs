//! Durable sync queue implementation
//!
//! Entries drain in `sequence` order. A note never has more than one entry:
//! new intents for a note with a pending entry are coalesced into it in
//! place, keeping its original position.

use crate::error::{Error, Result};
use crate::models::{EnqueueOutcome, NoteId, QueueEntry, SyncOperation};
use crate::sync::RetryPolicy;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

const ENTRY_COLUMNS: &str =
    "sequence, note_id, operation, attempts, revision, created_at, leased_at, next_attempt_at";

/// `SQLite`-backed sync queue
pub struct SqliteSyncQueue<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncQueue<'a> {
    /// Create a new queue view over the given connection (or transaction)
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
        let note_id: String = row.get(1)?;
        let note_id = note_id.parse::<NoteId>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error))
        })?;
        let operation: String = row.get(2)?;
        let operation = operation.parse::<SyncOperation>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, error.into())
        })?;

        Ok(QueueEntry {
            sequence: row.get(0)?,
            note_id,
            operation,
            attempts: row.get(3)?,
            revision: row.get(4)?,
            created_at: row.get(5)?,
            leased_at: row.get(6)?,
            next_attempt_at: row.get(7)?,
        })
    }

    /// Get an entry by sequence
    pub fn get(&self, sequence: i64) -> Result<Option<QueueEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE sequence = ?"),
                params![sequence],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Get the pending entry for a note, if any
    pub fn get_for_note(&self, note_id: &NoteId) -> Result<Option<QueueEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE note_id = ?"),
                params![note_id.as_str()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// All entries in drain order
    pub fn list(&self) -> Result<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_queue ORDER BY sequence"
        ))?;
        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Number of queued entries
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Enqueue `operation` for a note, coalescing with its pending entry.
    ///
    /// - nothing pending: append a new entry
    /// - `Create` + `Update`: stays `Create`
    /// - `Update` + `Update`: stays `Update`
    /// - `Create` + `Delete`: both cancelled when the create was never sent;
    ///   becomes `Delete` when the create is in flight
    /// - `Update` + `Delete`: becomes `Delete`
    /// - `Delete` + anything: rejected
    ///
    /// Coalescing bumps the entry's revision and clears its retry state.
    pub fn enqueue(
        &self,
        note_id: &NoteId,
        operation: SyncOperation,
        now: i64,
    ) -> Result<EnqueueOutcome> {
        let Some(existing) = self.get_for_note(note_id)? else {
            self.conn.execute(
                "INSERT INTO sync_queue (note_id, operation, created_at) VALUES (?, ?, ?)",
                params![note_id.as_str(), operation.as_str(), now],
            )?;
            let sequence = self.conn.last_insert_rowid();
            tracing::debug!("Enqueued {operation} for note {note_id} at sequence {sequence}");
            return Ok(EnqueueOutcome::Enqueued { sequence });
        };

        let merged = match (existing.operation, operation) {
            (SyncOperation::Delete, _) => {
                return Err(Error::NoteDeleted(note_id.to_string()));
            }
            (_, SyncOperation::Create) => {
                return Err(Error::InvalidInput(format!(
                    "note {note_id} already has a pending {}",
                    existing.operation
                )));
            }
            (SyncOperation::Create, SyncOperation::Delete) if !existing.is_leased() => {
                self.complete(existing.sequence)?;
                tracing::debug!("Cancelled unsent create for note {note_id}");
                return Ok(EnqueueOutcome::Cancelled);
            }
            (SyncOperation::Create, SyncOperation::Update) => SyncOperation::Create,
            (SyncOperation::Update | SyncOperation::Create, SyncOperation::Delete) => {
                SyncOperation::Delete
            }
            (SyncOperation::Update, SyncOperation::Update) => SyncOperation::Update,
        };

        self.conn.execute(
            "UPDATE sync_queue
             SET operation = ?, revision = revision + 1, attempts = 0, next_attempt_at = 0
             WHERE sequence = ?",
            params![merged.as_str(), existing.sequence],
        )?;
        tracing::debug!(
            "Coalesced {operation} into {} entry {} for note {note_id}",
            existing.operation,
            existing.sequence
        );
        Ok(EnqueueOutcome::Coalesced {
            sequence: existing.sequence,
            operation: merged,
        })
    }

    /// Lowest-sequence entry after `after_sequence` that is not leased and is
    /// eligible to run.
    ///
    /// Automatic drains skip entries still backing off and entries past the
    /// retry ceiling; `ignore_backoff` (manual drains) includes both.
    pub fn peek_next(
        &self,
        after_sequence: i64,
        now: i64,
        ignore_backoff: bool,
        max_attempts: u32,
    ) -> Result<Option<QueueEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM sync_queue
                     WHERE leased_at IS NULL
                       AND sequence > ?1
                       AND (?2 OR (attempts <= ?3 AND next_attempt_at <= ?4))
                     ORDER BY sequence
                     LIMIT 1"
                ),
                params![after_sequence, ignore_backoff, max_attempts, now],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Claim an entry for an in-flight attempt.
    ///
    /// Returns `None` if the entry is gone or already leased.
    pub fn lease(&self, sequence: i64, now: i64) -> Result<Option<QueueEntry>> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET leased_at = ? WHERE sequence = ? AND leased_at IS NULL",
            params![now, sequence],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get(sequence)
    }

    /// Remove a confirmed (or cancelled) entry
    pub fn complete(&self, sequence: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE sequence = ?", params![sequence])?;
        Ok(rows > 0)
    }

    /// Record a failed attempt: bump `attempts`, release the lease and push
    /// the next automatic attempt out by the policy's backoff.
    pub fn fail(
        &self,
        sequence: i64,
        now: i64,
        policy: &RetryPolicy,
    ) -> Result<Option<QueueEntry>> {
        let Some(entry) = self.get(sequence)? else {
            return Ok(None);
        };
        let delay = policy.delay_for_attempt(entry.attempts);
        let next_attempt_at =
            now.saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX));

        self.conn.execute(
            "UPDATE sync_queue
             SET attempts = attempts + 1, leased_at = NULL, next_attempt_at = ?
             WHERE sequence = ?",
            params![next_attempt_at, sequence],
        )?;
        self.get(sequence)
    }

    /// Record a permanent failure: the entry is released and moved past the
    /// retry ceiling so automatic drains skip it
    pub fn give_up(&self, sequence: i64, max_attempts: u32) -> Result<Option<QueueEntry>> {
        self.conn.execute(
            "UPDATE sync_queue
             SET attempts = MAX(attempts + 1, ?), leased_at = NULL, next_attempt_at = 0
             WHERE sequence = ?",
            params![i64::from(max_attempts) + 1, sequence],
        )?;
        self.get(sequence)
    }

    /// Release a lease without counting a failed attempt
    pub fn release(&self, sequence: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET leased_at = NULL WHERE sequence = ?",
            params![sequence],
        )?;
        Ok(())
    }

    /// Rewrite the operation of an entry (e.g. a confirmed create that was
    /// edited in flight continues as an update)
    pub fn set_operation(&self, sequence: i64, operation: SyncOperation) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET operation = ? WHERE sequence = ?",
            params![operation.as_str(), sequence],
        )?;
        Ok(())
    }

    /// Release every lease. Leases cannot survive a restart, so all of them
    /// are stale when the engine starts.
    pub fn release_stale_leases(&self) -> Result<usize> {
        let released = self.conn.execute(
            "UPDATE sync_queue SET leased_at = NULL WHERE leased_at IS NOT NULL",
            [],
        )?;
        Ok(released)
    }

    /// Earliest time an automatic drain has work to do
    pub fn next_retry_at(&self, max_attempts: u32) -> Result<Option<i64>> {
        let next = self.conn.query_row(
            "SELECT MIN(next_attempt_at) FROM sync_queue
             WHERE leased_at IS NULL AND attempts <= ?",
            params![max_attempts],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    /// Entries automatic drains gave up on
    pub fn list_exhausted(&self, max_attempts: u32) -> Result<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE attempts > ? ORDER BY sequence"
        ))?;
        let entries = stmt
            .query_map(params![max_attempts], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
