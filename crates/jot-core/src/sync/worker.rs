//! Background sync worker.
//!
//! Drains run when a local change is queued, when connectivity comes back,
//! on a periodic timer and when the earliest backoff expires. Triggers that
//! arrive while a drain is running collapse into a single follow-up drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::{DrainMode, SyncExecutor};
use crate::state::SyncState;

#[derive(Default)]
struct Trigger {
    notify: Notify,
    pending: AtomicBool,
    manual: AtomicBool,
    shutdown: AtomicBool,
}

impl Trigger {
    fn fire(&self, manual: bool) {
        if manual {
            self.manual.store(true, Ordering::SeqCst);
        }
        self.pending.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

/// Cloneable control handle for a running [`SyncWorker`]
#[derive(Clone)]
pub struct SyncHandle {
    trigger: Arc<Trigger>,
    state_rx: watch::Receiver<SyncState>,
}

impl SyncHandle {
    /// Ask for a manual drain: backoff and the retry ceiling are ignored.
    /// Returns immediately.
    pub fn request_sync(&self) {
        self.trigger.fire(true);
    }

    /// Signal that a local change was queued
    pub fn nudge(&self) {
        self.trigger.fire(false);
    }

    /// Stop the worker after its current drain
    pub fn shutdown(&self) {
        self.trigger.shutdown.store(true, Ordering::SeqCst);
        self.trigger.notify.notify_one();
    }

    pub fn state(&self) -> SyncState {
        *self.state_rx.borrow()
    }

    /// Subscribe to sync state changes
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Single background task that owns all automatic drains
pub struct SyncWorker {
    executor: Arc<SyncExecutor>,
    trigger: Arc<Trigger>,
    state_tx: watch::Sender<SyncState>,
    periodic_interval: Option<Duration>,
}

impl SyncWorker {
    pub fn new(
        executor: Arc<SyncExecutor>,
        periodic_interval: Option<Duration>,
    ) -> (Self, SyncHandle) {
        let initial = if executor.connectivity().is_online() {
            SyncState::Synced
        } else {
            SyncState::Offline
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let trigger = Arc::new(Trigger::default());

        let worker = Self {
            executor,
            trigger: Arc::clone(&trigger),
            state_tx,
            periodic_interval,
        };
        let handle = SyncHandle { trigger, state_rx };
        (worker, handle)
    }

    /// Run until [`SyncHandle::shutdown`] is called.
    ///
    /// Intended to be spawned onto the runtime.
    pub async fn run(self) {
        let mut connectivity = self.executor.connectivity().subscribe();
        let mut was_online = *connectivity.borrow_and_update();
        let mut periodic = self.periodic_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        tracing::info!("Sync worker started");
        // Work left over from a previous session
        self.trigger.pending.store(true, Ordering::SeqCst);

        loop {
            self.drain_pending().await;
            if self.trigger.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let retry_in = if was_online {
                self.next_retry_delay().await
            } else {
                None
            };

            tokio::select! {
                () = self.trigger.notify.notified() => {}
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Connectivity monitor dropped; stopping sync worker");
                        break;
                    }
                    let online = *connectivity.borrow_and_update();
                    if online && !was_online {
                        tracing::debug!("Back online; draining sync queue");
                        self.trigger.pending.store(true, Ordering::SeqCst);
                    } else if !online {
                        self.publish(SyncState::Offline);
                    }
                    was_online = online;
                }
                () = Self::tick(periodic.as_mut()) => {
                    tracing::trace!("Periodic sync tick");
                    self.trigger.pending.store(true, Ordering::SeqCst);
                }
                () = Self::sleep_for(retry_in) => {
                    self.trigger.pending.store(true, Ordering::SeqCst);
                }
            }
        }

        tracing::info!("Sync worker stopped");
    }

    async fn drain_pending(&self) {
        while self.trigger.pending.swap(false, Ordering::SeqCst) {
            if self.trigger.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let mode = if self.trigger.manual.swap(false, Ordering::SeqCst) {
                DrainMode::Manual
            } else {
                DrainMode::Automatic
            };
            self.drain_once(mode).await;
        }
    }

    async fn drain_once(&self, mode: DrainMode) {
        if !self.executor.connectivity().is_online() {
            self.publish(SyncState::Offline);
            return;
        }

        self.publish(SyncState::Syncing);
        let state = match self.executor.drain(mode).await {
            Ok(report) if report.interrupted => SyncState::Offline,
            Ok(_) => match self.executor.exhausted_entries().await {
                Ok(entries) if entries.is_empty() => SyncState::Synced,
                Ok(entries) => SyncState::NeedsAttention(entries.len()),
                Err(error) => {
                    tracing::error!("Failed to inspect sync queue: {error}");
                    SyncState::Error
                }
            },
            Err(error) => {
                tracing::error!("Sync queue drain failed: {error}");
                SyncState::Error
            }
        };
        self.publish(state);
    }

    async fn next_retry_delay(&self) -> Option<Duration> {
        match self.executor.next_retry_at().await {
            Ok(next) => next.map(|at| {
                let now = chrono::Utc::now().timestamp_millis();
                Duration::from_millis(u64::try_from(at.saturating_sub(now)).unwrap_or(0))
            }),
            Err(error) => {
                tracing::warn!("Failed to read next sync retry time: {error}");
                None
            }
        }
    }

    fn publish(&self, state: SyncState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!("Sync state: {current} -> {state}");
                *current = state;
                true
            }
        });
    }

    async fn tick(interval: Option<&mut Interval>) {
        match interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    async fn sleep_for(delay: Option<Duration>) {
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::db::{Database, NoteStore, SqliteNoteStore, SqliteSyncQueue};
    use crate::models::{Note, NoteKind, SyncOperation};
    use crate::remote::fake::FakeNoteClient;
    use crate::remote::RemoteError;
    use crate::services::LocalStore;
    use crate::sync::RetryPolicy;

    struct Harness {
        store: Arc<LocalStore>,
        remote: Arc<FakeNoteClient>,
        connectivity: ConnectivityMonitor,
        handle: SyncHandle,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_worker(online: bool, policy: RetryPolicy, pending: &[&str]) -> Harness {
        let db = Database::open_in_memory().unwrap();
        for content in pending {
            let note = Note::new(*content, NoteKind::General);
            SqliteNoteStore::new(db.connection()).upsert(&note).unwrap();
            SqliteSyncQueue::new(db.connection())
                .enqueue(&note.id, SyncOperation::Create, 1)
                .unwrap();
        }
        let store = Arc::new(LocalStore::new(db).unwrap());
        let remote = Arc::new(FakeNoteClient::new());
        let connectivity = ConnectivityMonitor::new(online);
        let executor = Arc::new(
            SyncExecutor::new(
                Arc::clone(&store),
                remote.clone(),
                connectivity.clone(),
                policy,
                Duration::from_secs(5),
            )
            .with_pull_after_push(false),
        );
        let (worker, handle) = SyncWorker::new(executor, None);
        let task = tokio::spawn(worker.run());
        Harness {
            store,
            remote,
            connectivity,
            handle,
            task,
        }
    }

    async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !check() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn wait_for_state(handle: &SyncHandle, expected: SyncState) {
        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|state| *state == expected))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {expected}"))
            .unwrap();
    }

    #[tokio::test]
    async fn drains_leftover_queue_on_start() {
        let h = spawn_worker(true, RetryPolicy::default(), &["left over"]);

        eventually("remote create", || h.remote.notes().len() == 1).await;
        wait_for_state(&h.handle, SyncState::Synced).await;

        h.handle.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn nudge_drains_new_entries() {
        let h = spawn_worker(true, RetryPolicy::default(), &[]);
        let note = Note::new("fresh", NoteKind::General);
        h.store
            .write(move |tx| {
                SqliteNoteStore::new(tx).upsert(&note)?;
                SqliteSyncQueue::new(tx).enqueue(&note.id, SyncOperation::Create, 1)
            })
            .await
            .unwrap();

        h.handle.nudge();

        eventually("remote create", || h.remote.notes().len() == 1).await;
        h.handle.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn reconnect_triggers_drain() {
        let h = spawn_worker(false, RetryPolicy::default(), &["offline edit"]);
        assert_eq!(h.handle.state(), SyncState::Offline);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.remote.calls().is_empty());

        h.connectivity.set_online(true);
        eventually("remote create", || h.remote.notes().len() == 1).await;

        h.connectivity.set_online(false);
        wait_for_state(&h.handle, SyncState::Offline).await;

        h.handle.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn retries_after_backoff_without_new_triggers() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(20),
        };
        let h = spawn_worker(true, policy, &[]);
        h.remote
            .fail_next(RemoteError::Transient("blip".to_string()));
        let note = Note::new("retry me", NoteKind::General);
        h.store
            .write(move |tx| {
                SqliteNoteStore::new(tx).upsert(&note)?;
                SqliteSyncQueue::new(tx).enqueue(&note.id, SyncOperation::Create, 1)
            })
            .await
            .unwrap();
        h.handle.nudge();

        eventually("retried create", || h.remote.notes().len() == 1).await;
        assert_eq!(h.remote.calls().len(), 2);

        h.handle.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_entries_need_attention_until_manual_sync() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        let h = spawn_worker(false, policy, &["stuck"]);
        h.remote
            .fail_next(RemoteError::Transient("down".to_string()));
        h.connectivity.set_online(true);

        wait_for_state(&h.handle, SyncState::NeedsAttention(1)).await;
        assert_eq!(h.remote.calls().len(), 1);

        h.handle.request_sync();
        eventually("manual retry", || h.remote.notes().len() == 1).await;
        wait_for_state(&h.handle, SyncState::Synced).await;

        h.handle.shutdown();
        h.task.await.unwrap();
    }
}
