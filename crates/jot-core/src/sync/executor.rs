//! Queue drain: pushes pending local changes to the remote store one entry at
//! a time and reconciles each result into the local store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::RetryPolicy;
use crate::connectivity::{wait_until_offline, ConnectivityMonitor};
use crate::db::{NoteStore, SqliteConflictStore, SqliteNoteStore, SqliteSyncQueue};
use crate::models::{Note, QueueEntry, SyncConflict, SyncOperation, SyncStatus};
use crate::remote::{NoteFilter, NotePayload, RemoteError, RemoteNote, RemoteNoteClient};
use crate::services::LocalStore;
use crate::Result;

/// Who asked for a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Triggered by an edit, reconnection or timer: honors backoff and the
    /// retry ceiling
    Automatic,
    /// Explicit user request: attempts every entry once, including entries
    /// that are backing off or past the ceiling
    Manual,
}

/// Summary of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries confirmed by the remote (or resolved locally)
    pub completed: usize,
    /// Entries that ended in a conflict
    pub conflicts: usize,
    /// Attempts that failed and were rescheduled
    pub failed: usize,
    /// Failed entries that are now past the retry ceiling
    pub needs_attention: usize,
    /// Local notes inserted, refreshed or removed by the follow-up pull
    pub pulled: usize,
    /// The pass stopped early because connectivity was lost
    pub interrupted: bool,
}

impl DrainReport {
    pub const fn attempted(&self) -> usize {
        self.completed + self.conflicts + self.failed
    }
}

enum Outcome {
    Completed,
    Conflict,
    Failed { exhausted: bool },
    /// The entry changed while its attempt was in flight and stays queued
    Requeued,
    Interrupted,
}

enum Request {
    Create(NotePayload),
    Update {
        remote_id: i64,
        payload: NotePayload,
        base_updated_at: Option<i64>,
    },
    Delete(i64),
}

/// Drains the sync queue against a remote note store.
///
/// At most one drain runs at a time; concurrent callers wait their turn.
pub struct SyncExecutor {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteNoteClient>,
    connectivity: ConnectivityMonitor,
    policy: RetryPolicy,
    request_timeout: Duration,
    pull_after_push: bool,
    drain_gate: Mutex<()>,
}

impl SyncExecutor {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteNoteClient>,
        connectivity: ConnectivityMonitor,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            policy,
            request_timeout,
            pull_after_push: true,
            drain_gate: Mutex::new(()),
        }
    }

    /// Whether a drain that empties the queue also pulls remote changes
    #[must_use]
    pub const fn with_pull_after_push(mut self, pull_after_push: bool) -> Self {
        self.pull_after_push = pull_after_push;
        self
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Drain the queue in order until it is empty, nothing is eligible, or
    /// connectivity is lost.
    ///
    /// Each entry is attempted at most once per pass.
    pub async fn drain(&self, mode: DrainMode) -> Result<DrainReport> {
        let _gate = self.drain_gate.lock().await;
        let mut report = DrainReport::default();

        if !self.connectivity.is_online() {
            tracing::debug!("Skipping sync queue drain while offline");
            report.interrupted = true;
            return Ok(report);
        }

        let ignore_backoff = mode == DrainMode::Manual;
        let max_attempts = self.policy.max_attempts;
        let mut cursor = 0;

        loop {
            if !self.connectivity.is_online() {
                tracing::info!("Connectivity lost; leaving the rest of the sync queue for later");
                report.interrupted = true;
                break;
            }

            let now = chrono::Utc::now().timestamp_millis();
            let leased = self
                .store
                .write(|tx| {
                    let queue = SqliteSyncQueue::new(tx);
                    let Some(next) = queue.peek_next(cursor, now, ignore_backoff, max_attempts)?
                    else {
                        return Ok(None);
                    };
                    let note = SqliteNoteStore::new(tx).get(&next.note_id)?;
                    Ok(queue.lease(next.sequence, now)?.map(|entry| (entry, note)))
                })
                .await?;

            let Some((entry, note)) = leased else {
                break;
            };
            cursor = entry.sequence;

            match self.process(&entry, note).await? {
                Outcome::Completed => report.completed += 1,
                Outcome::Conflict => report.conflicts += 1,
                Outcome::Failed { exhausted } => {
                    report.failed += 1;
                    if exhausted {
                        report.needs_attention += 1;
                    }
                }
                Outcome::Requeued => {}
                Outcome::Interrupted => {
                    report.interrupted = true;
                    break;
                }
            }
        }

        if !report.interrupted && self.pull_after_push {
            let queue_empty = self
                .store
                .read(|conn| SqliteSyncQueue::new(conn).is_empty())
                .await?;
            if queue_empty {
                match self.pull_remote(&NoteFilter::default()).await {
                    Ok(pulled) => report.pulled = pulled,
                    Err(error) => tracing::warn!("Pull after sync failed: {error}"),
                }
            }
        }

        if report.attempted() > 0 || report.pulled > 0 {
            tracing::info!(
                "Sync pass finished: {} completed, {} conflicts, {} failed, {} pulled",
                report.completed,
                report.conflicts,
                report.failed,
                report.pulled
            );
        }
        Ok(report)
    }

    /// Fetch remote notes and fold them into the local store.
    ///
    /// Notes with pending local changes or unresolved conflicts are never
    /// overwritten. Returns the number of local notes changed.
    pub async fn pull(&self, filter: &NoteFilter) -> Result<usize> {
        let _gate = self.drain_gate.lock().await;
        self.pull_remote(filter).await
    }

    /// Earliest time (Unix ms) an automatic drain has a retry to make
    pub async fn next_retry_at(&self) -> Result<Option<i64>> {
        let max_attempts = self.policy.max_attempts;
        self.store
            .read(|conn| SqliteSyncQueue::new(conn).next_retry_at(max_attempts))
            .await
    }

    /// Entries automatic drains have given up on
    pub async fn exhausted_entries(&self) -> Result<Vec<QueueEntry>> {
        let max_attempts = self.policy.max_attempts;
        self.store
            .read(|conn| SqliteSyncQueue::new(conn).list_exhausted(max_attempts))
            .await
    }

    async fn process(&self, entry: &QueueEntry, note: Option<Note>) -> Result<Outcome> {
        let Some(note) = note else {
            tracing::warn!(
                "Dropping {} entry {} for missing note {}",
                entry.operation,
                entry.sequence,
                entry.note_id
            );
            self.store
                .write(|tx| SqliteSyncQueue::new(tx).complete(entry.sequence))
                .await?;
            return Ok(Outcome::Completed);
        };

        let Some(request) = Self::build_request(entry, &note) else {
            // Never reached the remote, so there is nothing to delete there
            self.store
                .write(|tx| {
                    SqliteConflictStore::new(tx).remove(&note.id)?;
                    SqliteNoteStore::new(tx).delete(&note.id)?;
                    SqliteSyncQueue::new(tx).complete(entry.sequence)
                })
                .await?;
            tracing::debug!("Deleted unsynced note {} locally", note.id);
            return Ok(Outcome::Completed);
        };

        let mut connectivity = self.connectivity.subscribe();
        let dispatched = AtomicBool::new(false);
        let attempt = async {
            dispatched.store(true, Ordering::SeqCst);
            tokio::time::timeout(self.request_timeout, self.send(&request)).await
        };
        let result = tokio::select! {
            biased;
            () = wait_until_offline(&mut connectivity) => {
                if dispatched.load(Ordering::SeqCst) {
                    tracing::info!(
                        "Connectivity lost while syncing note {}; abandoning attempt",
                        note.id
                    );
                    self.record_failure(entry, "connectivity lost").await?;
                } else {
                    self.store
                        .write(|tx| SqliteSyncQueue::new(tx).release(entry.sequence))
                        .await?;
                }
                return Ok(Outcome::Interrupted);
            }
            result = attempt => {
                result.unwrap_or_else(|_| {
                    Err(RemoteError::Transient(format!(
                        "request timed out after {}ms",
                        self.request_timeout.as_millis()
                    )))
                })
            }
        };

        match (result, &request) {
            (Ok(Some(remote)), _) => self.confirm_write(entry, &remote).await,
            (Ok(None), _) => self.confirm_delete(entry).await,
            (Err(RemoteError::PreconditionFailed { current }), Request::Update { remote_id, .. }) => {
                let conflict = SyncConflict::diverged(note.id, *remote_id, current.as_deref());
                self.record_conflict(entry, conflict).await
            }
            (Err(RemoteError::NotFound), Request::Update { remote_id, .. }) => {
                let conflict = SyncConflict::deleted_remotely(note.id, *remote_id);
                self.record_conflict(entry, conflict).await
            }
            (Err(error), _) if error.is_transient() => {
                self.record_failure(entry, &error.to_string()).await
            }
            (Err(error), _) => self.record_rejection(entry, &error.to_string()).await,
        }
    }

    fn build_request(entry: &QueueEntry, note: &Note) -> Option<Request> {
        let payload = NotePayload::from(note);
        match (entry.operation, note.remote_id) {
            (SyncOperation::Delete, None) => None,
            (SyncOperation::Delete, Some(remote_id)) => Some(Request::Delete(remote_id)),
            (SyncOperation::Create, _) | (SyncOperation::Update, None) => {
                Some(Request::Create(payload))
            }
            (SyncOperation::Update, Some(remote_id)) => Some(Request::Update {
                remote_id,
                payload,
                base_updated_at: note.base_remote_updated_at,
            }),
        }
    }

    /// Perform one remote call. `Ok(None)` means the note is gone remotely.
    async fn send(&self, request: &Request) -> std::result::Result<Option<RemoteNote>, RemoteError> {
        match request {
            Request::Create(payload) => self.remote.create(payload).await.map(Some),
            Request::Update {
                remote_id,
                payload,
                base_updated_at,
            } => self
                .remote
                .update(*remote_id, payload, *base_updated_at)
                .await
                .map(Some),
            Request::Delete(remote_id) => match self.remote.delete(*remote_id).await {
                Ok(()) | Err(RemoteError::NotFound) => Ok(None),
                Err(error) => Err(error),
            },
        }
    }

    /// Apply a confirmed create/update.
    ///
    /// If the entry was coalesced while the request was in flight, the newer
    /// local content stays queued against the confirmed server version.
    async fn confirm_write(&self, entry: &QueueEntry, remote: &RemoteNote) -> Result<Outcome> {
        self.store
            .write(|tx| {
                let queue = SqliteSyncQueue::new(tx);
                let notes = SqliteNoteStore::new(tx);
                let current = queue.get(entry.sequence)?;
                let Some(mut note) = notes.get(&entry.note_id)? else {
                    queue.complete(entry.sequence)?;
                    return Ok(Outcome::Completed);
                };

                note.remote_id = Some(remote.id);
                note.base_remote_updated_at = Some(remote.updated_at);

                match current {
                    Some(current) if current.revision != entry.revision => {
                        if current.operation == SyncOperation::Create {
                            queue.set_operation(current.sequence, SyncOperation::Update)?;
                            note.sync_status = SyncStatus::PendingUpdate;
                        }
                        notes.upsert(&note)?;
                        queue.release(current.sequence)?;
                        tracing::debug!(
                            "Note {} changed during sync; keeping it queued as {}",
                            note.id,
                            current.operation
                        );
                        Ok(Outcome::Requeued)
                    }
                    _ => {
                        note.updated_at = remote.updated_at;
                        note.sync_status = SyncStatus::Synced;
                        notes.upsert(&note)?;
                        queue.complete(entry.sequence)?;
                        tracing::debug!("Synced note {} as remote {}", note.id, remote.id);
                        Ok(Outcome::Completed)
                    }
                }
            })
            .await
    }

    async fn confirm_delete(&self, entry: &QueueEntry) -> Result<Outcome> {
        self.store
            .write(|tx| {
                SqliteConflictStore::new(tx).remove(&entry.note_id)?;
                SqliteNoteStore::new(tx).delete(&entry.note_id)?;
                SqliteSyncQueue::new(tx).complete(entry.sequence)?;
                Ok(())
            })
            .await?;
        tracing::debug!("Deleted note {} remotely", entry.note_id);
        Ok(Outcome::Completed)
    }

    async fn record_conflict(&self, entry: &QueueEntry, conflict: SyncConflict) -> Result<Outcome> {
        let outcome = self
            .store
            .write(|tx| {
                let queue = SqliteSyncQueue::new(tx);
                let notes = SqliteNoteStore::new(tx);

                // Deleted locally while the update was in flight: the delete wins
                if let Some(current) = queue.get(entry.sequence)? {
                    if current.operation == SyncOperation::Delete {
                        queue.release(current.sequence)?;
                        return Ok(Outcome::Requeued);
                    }
                }

                if let Some(mut note) = notes.get(&entry.note_id)? {
                    note.sync_status = SyncStatus::Conflict;
                    notes.upsert(&note)?;
                    SqliteConflictStore::new(tx).record(&conflict)?;
                }
                queue.complete(entry.sequence)?;
                Ok(Outcome::Conflict)
            })
            .await?;

        if matches!(outcome, Outcome::Conflict) {
            if conflict.remote_deleted {
                tracing::warn!("Sync conflict on note {}: deleted remotely", conflict.note_id);
            } else {
                tracing::warn!("Sync conflict on note {}: remote version diverged", conflict.note_id);
            }
        }
        Ok(outcome)
    }

    async fn record_failure(&self, entry: &QueueEntry, reason: &str) -> Result<Outcome> {
        let now = chrono::Utc::now().timestamp_millis();
        let policy = self.policy;
        let failed = self
            .store
            .write(|tx| SqliteSyncQueue::new(tx).fail(entry.sequence, now, &policy))
            .await?;

        let Some(failed) = failed else {
            return Ok(Outcome::Failed { exhausted: false });
        };
        let exhausted = self.policy.is_exhausted(failed.attempts);
        if exhausted {
            tracing::warn!(
                "Sync of note {} needs attention after {} failed attempts: {reason}",
                failed.note_id,
                failed.attempts
            );
        } else {
            tracing::warn!(
                "Sync of note {} failed (attempt {}), retrying after {}ms: {reason}",
                failed.note_id,
                failed.attempts,
                failed.next_attempt_at.saturating_sub(now)
            );
        }
        Ok(Outcome::Failed { exhausted })
    }

    /// Park an entry the server refused past the retry ceiling; only a manual
    /// drain sends it again
    async fn record_rejection(&self, entry: &QueueEntry, reason: &str) -> Result<Outcome> {
        let max_attempts = self.policy.max_attempts;
        let parked = self
            .store
            .write(|tx| {
                let queue = SqliteSyncQueue::new(tx);
                match queue.get(entry.sequence)? {
                    // A newer local edit deserves a fresh attempt
                    Some(current) if current.revision != entry.revision => {
                        queue.release(current.sequence)?;
                        Ok(None)
                    }
                    Some(_) => queue.give_up(entry.sequence, max_attempts),
                    None => Ok(None),
                }
            })
            .await?;

        let Some(parked) = parked else {
            return Ok(Outcome::Requeued);
        };
        tracing::warn!(
            "Sync of note {} needs attention; the server refused it: {reason}",
            parked.note_id
        );
        Ok(Outcome::Failed { exhausted: true })
    }

    async fn pull_remote(&self, filter: &NoteFilter) -> Result<usize> {
        let listed =
            match tokio::time::timeout(self.request_timeout, self.remote.list(filter)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(RemoteError::Transient(format!(
                        "list timed out after {}ms",
                        self.request_timeout.as_millis()
                    ))
                    .into());
                }
            };

        let changed = self
            .store
            .write(|tx| {
                let notes = SqliteNoteStore::new(tx);
                let mut changed = 0;
                let mut seen = HashSet::with_capacity(listed.len());

                for remote in &listed {
                    seen.insert(remote.id);
                    match notes.get_by_remote_id(remote.id)? {
                        None => {
                            notes.upsert(&Note::from_remote(remote))?;
                            changed += 1;
                        }
                        Some(mut local)
                            if local.sync_status == SyncStatus::Synced
                                && local
                                    .base_remote_updated_at
                                    .map_or(true, |base| remote.updated_at > base) =>
                        {
                            local.apply_remote(remote);
                            notes.upsert(&local)?;
                            changed += 1;
                        }
                        Some(_) => {}
                    }
                }

                if filter.is_complete() {
                    for local in notes.list_by_status(SyncStatus::Synced)? {
                        if local.remote_id.is_some_and(|id| !seen.contains(&id)) {
                            notes.delete(&local.id)?;
                            changed += 1;
                        }
                    }
                }
                Ok(changed)
            })
            .await?;

        if changed > 0 {
            tracing::info!("Pulled {changed} remote change(s)");
        }
        Ok(changed)
    }
}
