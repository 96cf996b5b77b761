//! Offline-first note repository.
//!
//! The single entry point for reading and mutating notes. Every mutation
//! applies the change locally and records the matching sync intent in one
//! transaction, then returns without waiting for the network.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::LocalStore;
use crate::config::{ClientConfig, SyncConfig};
use crate::connectivity::ConnectivityMonitor;
use crate::db::{Database, NoteStore, SqliteConflictStore, SqliteNoteStore, SqliteSyncQueue};
use crate::models::{
    ConflictResolution, EnqueueOutcome, Note, NoteId, NoteKind, QueueEntry, SyncConflict,
    SyncOperation, SyncStatus,
};
use crate::remote::{HttpNoteClient, RemoteNoteClient};
use crate::state::SyncState;
use crate::sync::{DrainMode, DrainReport, SyncExecutor, SyncHandle, SyncWorker};
use crate::{Error, Result};

/// Note repository backed by the local database and, optionally, a remote
pub struct OfflineNoteRepository {
    store: Arc<LocalStore>,
    executor: Option<Arc<SyncExecutor>>,
    worker: Option<SyncHandle>,
    config: SyncConfig,
}

impl OfflineNoteRepository {
    /// Local-only repository: changes are queued but never sent
    pub fn local(db: Database, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(LocalStore::new(db)?),
            executor: None,
            worker: None,
            config,
        })
    }

    /// Repository that syncs with `remote`
    pub fn with_remote(
        db: Database,
        remote: Arc<dyn RemoteNoteClient>,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(LocalStore::new(db)?);
        let executor = SyncExecutor::new(
            Arc::clone(&store),
            remote,
            connectivity,
            config.retry_policy(),
            config.request_timeout(),
        )
        .with_pull_after_push(config.pull_after_push);

        Ok(Self {
            store,
            executor: Some(Arc::new(executor)),
            worker: None,
            config,
        })
    }

    /// Build a repository from a client configuration, syncing over HTTP when
    /// a remote API is configured
    pub fn open(
        db: Database,
        config: &ClientConfig,
        connectivity: ConnectivityMonitor,
    ) -> Result<Self> {
        if !config.remote.is_configured() {
            tracing::info!("Running in local-only mode (no remote configured)");
            return Self::local(db, config.sync.clone());
        }

        let client = HttpNoteClient::new(&config.remote, config.sync.request_timeout())?;
        tracing::info!("Sync enabled against {:?}", client);
        Self::with_remote(db, Arc::new(client), connectivity, config.sync.clone())
    }

    /// Start the background sync worker on the current tokio runtime
    pub fn start_sync(&mut self) -> Result<JoinHandle<()>> {
        let executor = self.executor()?;
        if self.worker.is_some() {
            return Err(Error::Config("sync worker is already running".to_string()));
        }

        let (worker, handle) =
            SyncWorker::new(Arc::clone(executor), self.config.periodic_interval());
        self.worker = Some(handle);
        Ok(tokio::spawn(worker.run()))
    }

    /// Whether a remote is configured
    pub const fn is_sync_enabled(&self) -> bool {
        self.executor.is_some()
    }

    /// All notes, most recently updated first, including unsynced edits
    pub async fn list(&self) -> Result<Vec<Note>> {
        self.store
            .read(|conn| SqliteNoteStore::new(conn).list())
            .await
    }

    pub async fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let id = *id;
        self.store
            .read(move |conn| SqliteNoteStore::new(conn).get(&id))
            .await
    }

    /// Observable note collection
    pub fn subscribe(&self) -> watch::Receiver<Vec<Note>> {
        self.store.subscribe()
    }

    /// Create a note locally and queue it for upload
    pub async fn create(&self, content: &str, kind: NoteKind) -> Result<NoteId> {
        let content = validate_content(content)?;
        let note = Note::new(content, kind);
        let id = note.id;

        self.store
            .write(move |tx| {
                SqliteNoteStore::new(tx).upsert(&note)?;
                SqliteSyncQueue::new(tx).enqueue(&note.id, SyncOperation::Create, note.created_at)
            })
            .await?;

        tracing::debug!("Created note {id}");
        self.nudge();
        Ok(id)
    }

    /// Replace a note's content
    pub async fn update(&self, id: &NoteId, content: &str) -> Result<()> {
        let content = validate_content(content)?.to_string();
        self.edit(id, move |note| note.content = content).await
    }

    pub async fn set_archived(&self, id: &NoteId, archived: bool) -> Result<()> {
        self.edit(id, move |note| note.is_archived = archived).await
    }

    /// Delete a note. Unsent notes disappear immediately; synced notes stay
    /// as `PendingDelete` until the remote confirms.
    pub async fn delete(&self, id: &NoteId) -> Result<()> {
        let id = *id;
        let now = chrono::Utc::now().timestamp_millis();

        let outcome = self
            .store
            .write(move |tx| {
                let notes = SqliteNoteStore::new(tx);
                let mut note = notes
                    .get(&id)?
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;
                if note.sync_status == SyncStatus::PendingDelete {
                    return Err(Error::NoteDeleted(id.to_string()));
                }

                SqliteConflictStore::new(tx).remove(&id)?;
                let outcome = SqliteSyncQueue::new(tx).enqueue(&id, SyncOperation::Delete, now)?;
                if outcome == EnqueueOutcome::Cancelled {
                    notes.delete(&id)?;
                } else {
                    note.sync_status = SyncStatus::PendingDelete;
                    note.updated_at = now;
                    notes.upsert(&note)?;
                }
                Ok(outcome)
            })
            .await?;

        if outcome == EnqueueOutcome::Cancelled {
            tracing::debug!("Deleted unsent note {id}");
        } else {
            self.nudge();
        }
        Ok(())
    }

    /// Apply the user's decision to a note in `Conflict`
    pub async fn resolve_conflict(&self, id: &NoteId, resolution: ConflictResolution) -> Result<()> {
        let id = *id;
        if let ConflictResolution::Merge(content) = &resolution {
            validate_content(content)?;
        }
        let now = chrono::Utc::now().timestamp_millis();

        let queued = self
            .store
            .write(move |tx| {
                let notes = SqliteNoteStore::new(tx);
                let queue = SqliteSyncQueue::new(tx);
                let conflicts = SqliteConflictStore::new(tx);

                let mut note = notes
                    .get(&id)?
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;
                if note.sync_status != SyncStatus::Conflict {
                    return Err(Error::InvalidInput(format!(
                        "note {id} has no conflict to resolve"
                    )));
                }
                let conflict = conflicts.get(&id)?;
                let remote_deleted = conflict.as_ref().is_some_and(|c| c.remote_deleted);

                let queued = match resolution {
                    ConflictResolution::KeepLocal | ConflictResolution::Merge(_) => {
                        if let ConflictResolution::Merge(content) = resolution {
                            note.content = content;
                        }
                        note.updated_at = now;
                        if remote_deleted {
                            note.remote_id = None;
                            note.base_remote_updated_at = None;
                            note.sync_status = SyncStatus::PendingCreate;
                            notes.upsert(&note)?;
                            queue.enqueue(&id, SyncOperation::Create, now)?;
                        } else {
                            // Unknown server version: overwrite unconditionally
                            note.base_remote_updated_at =
                                conflict.as_ref().and_then(|c| c.remote_updated_at);
                            note.sync_status = SyncStatus::PendingUpdate;
                            notes.upsert(&note)?;
                            queue.enqueue(&id, SyncOperation::Update, now)?;
                        }
                        true
                    }
                    ConflictResolution::AcceptRemote => {
                        if remote_deleted {
                            notes.delete(&id)?;
                        } else {
                            let remote = conflict
                                .as_ref()
                                .and_then(SyncConflict::remote_note)
                                .ok_or_else(|| {
                                    Error::InvalidInput(format!(
                                        "remote version of note {id} is unknown; keep the local version or discard it"
                                    ))
                                })?;
                            note.apply_remote(&remote);
                            notes.upsert(&note)?;
                        }
                        false
                    }
                    ConflictResolution::Discard => {
                        if remote_deleted || note.remote_id.is_none() {
                            notes.delete(&id)?;
                            false
                        } else {
                            note.sync_status = SyncStatus::PendingDelete;
                            note.updated_at = now;
                            notes.upsert(&note)?;
                            queue.enqueue(&id, SyncOperation::Delete, now)?;
                            true
                        }
                    }
                };

                conflicts.remove(&id)?;
                Ok(queued)
            })
            .await?;

        tracing::info!("Resolved conflict on note {id}");
        if queued {
            self.nudge();
        }
        Ok(())
    }

    /// Unresolved conflicts, most recently detected first
    pub async fn list_conflicts(&self) -> Result<Vec<SyncConflict>> {
        self.store
            .read(|conn| SqliteConflictStore::new(conn).list())
            .await
    }

    pub async fn conflict(&self, id: &NoteId) -> Result<Option<SyncConflict>> {
        let id = *id;
        self.store
            .read(move |conn| SqliteConflictStore::new(conn).get(&id))
            .await
    }

    /// Queued sync intents in drain order
    pub async fn pending_entries(&self) -> Result<Vec<QueueEntry>> {
        self.store
            .read(|conn| SqliteSyncQueue::new(conn).list())
            .await
    }

    /// Entries past the retry ceiling; only a manual sync retries them
    pub async fn needs_attention(&self) -> Result<Vec<QueueEntry>> {
        let max_attempts = self.config.max_attempts;
        self.store
            .read(move |conn| SqliteSyncQueue::new(conn).list_exhausted(max_attempts))
            .await
    }

    /// Ask the background worker for a manual sync; returns immediately
    pub fn sync_now(&self) -> Result<()> {
        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| Error::Config("sync worker is not running".to_string()))?;
        worker.request_sync();
        Ok(())
    }

    /// Run a manual drain on the calling task and wait for it
    pub async fn drain_now(&self) -> Result<DrainReport> {
        self.executor()?.drain(DrainMode::Manual).await
    }

    /// Sync state feed of the background worker, if running
    pub fn sync_state(&self) -> Option<watch::Receiver<SyncState>> {
        self.worker.as_ref().map(SyncHandle::subscribe)
    }

    /// Stop the background worker after its current drain
    pub fn shutdown(&self) {
        if let Some(worker) = &self.worker {
            worker.shutdown();
        }
    }

    fn executor(&self) -> Result<&Arc<SyncExecutor>> {
        self.executor
            .as_ref()
            .ok_or_else(|| Error::Config("no remote is configured".to_string()))
    }

    fn nudge(&self) {
        if let Some(worker) = &self.worker {
            worker.nudge();
        }
    }

    /// Apply a user edit and queue an update.
    ///
    /// Conflicted notes only change locally; the resolution decides what is
    /// sent.
    async fn edit(&self, id: &NoteId, apply: impl FnOnce(&mut Note) + Send) -> Result<()> {
        let id = *id;
        let now = chrono::Utc::now().timestamp_millis();

        let queued = self
            .store
            .write(move |tx| {
                let notes = SqliteNoteStore::new(tx);
                let mut note = notes
                    .get(&id)?
                    .ok_or_else(|| Error::NotFound(id.to_string()))?;

                let queue = match note.sync_status {
                    SyncStatus::PendingDelete => return Err(Error::NoteDeleted(id.to_string())),
                    SyncStatus::Conflict => false,
                    SyncStatus::Synced => {
                        note.sync_status = SyncStatus::PendingUpdate;
                        true
                    }
                    SyncStatus::PendingCreate | SyncStatus::PendingUpdate => true,
                };

                apply(&mut note);
                note.updated_at = now;
                notes.upsert(&note)?;
                if queue {
                    SqliteSyncQueue::new(tx).enqueue(&id, SyncOperation::Update, now)?;
                }
                Ok(queue)
            })
            .await?;

        if queued {
            self.nudge();
        }
        Ok(())
    }
}

impl Drop for OfflineNoteRepository {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_content(content: &str) -> Result<&str> {
    if content.trim().is_empty() {
        return Err(Error::InvalidInput(
            "note content cannot be empty".to_string(),
        ));
    }
    Ok(content)
}
