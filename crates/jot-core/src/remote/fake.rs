//! Scripted in-memory remote used by sync tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{NoteFilter, NotePayload, RemoteError, RemoteNote, RemoteNoteClient};
use crate::connectivity::ConnectivityMonitor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    List,
    Create(String),
    Update(i64),
    Delete(i64),
}

#[derive(Default)]
struct FakeState {
    notes: BTreeMap<i64, RemoteNote>,
    next_id: i64,
    clock: i64,
    scripted: VecDeque<RemoteError>,
    calls: Vec<FakeCall>,
    latency: Option<Duration>,
    drop_connection: Option<ConnectivityMonitor>,
}

impl FakeState {
    fn tick(&mut self) -> i64 {
        self.clock += 1_000;
        self.clock
    }
}

#[derive(Default)]
pub struct FakeNoteClient {
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeNoteClient {
    pub fn new() -> Self {
        let client = Self::default();
        {
            let mut state = client.state.lock().unwrap();
            state.next_id = 41;
            state.clock = 1_700_000_000_000;
        }
        client
    }

    /// Fail the next call (of any kind) with `error`
    pub fn fail_next(&self, error: RemoteError) {
        self.state.lock().unwrap().scripted.push_back(error);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = Some(latency);
    }

    /// Take the device offline while serving the next call, which still succeeds
    pub fn drop_connection_during_next_call(&self, connectivity: ConnectivityMonitor) {
        self.state.lock().unwrap().drop_connection = Some(connectivity);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn network_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !matches!(call, FakeCall::List))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn note(&self, id: i64) -> Option<RemoteNote> {
        self.state.lock().unwrap().notes.get(&id).cloned()
    }

    pub fn notes(&self) -> Vec<RemoteNote> {
        self.state.lock().unwrap().notes.values().cloned().collect()
    }

    /// Simulate a note created by another client
    pub fn seed(&self, content: &str) -> RemoteNote {
        let mut state = self.state.lock().unwrap();
        let note = RemoteNote {
            id: state.next_id,
            content: content.to_string(),
            kind: crate::models::NoteKind::General,
            is_archived: false,
            updated_at: state.tick(),
        };
        state.next_id += 1;
        state.notes.insert(note.id, note.clone());
        note
    }

    /// Simulate another client editing a note
    pub fn modify_remotely(&self, id: i64, content: &str) -> RemoteNote {
        let mut state = self.state.lock().unwrap();
        let updated_at = state.tick();
        let note = state.notes.get_mut(&id).expect("remote note exists");
        note.content = content.to_string();
        note.updated_at = updated_at;
        note.clone()
    }

    /// Simulate another client deleting a note
    pub fn delete_remotely(&self, id: i64) {
        self.state.lock().unwrap().notes.remove(&id);
    }

    async fn begin(&self, call: FakeCall) -> Result<InFlight<'_>, RemoteError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let latency = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let (scripted, drop_connection) = {
            let mut state = self.state.lock().unwrap();
            (state.scripted.pop_front(), state.drop_connection.take())
        };
        if let Some(connectivity) = drop_connection {
            connectivity.set_online(false);
        }
        match scripted {
            Some(error) => Err(error),
            None => Ok(guard),
        }
    }
}

#[async_trait]
impl RemoteNoteClient for FakeNoteClient {
    async fn list(&self, filter: &NoteFilter) -> Result<Vec<RemoteNote>, RemoteError> {
        let _guard = self.begin(FakeCall::List).await?;
        let state = self.state.lock().unwrap();
        Ok(state
            .notes
            .values()
            .filter(|note| filter.include_archived || !note.is_archived)
            .filter(|note| filter.kind.map_or(true, |kind| kind == note.kind))
            .filter(|note| {
                filter
                    .updated_since
                    .map_or(true, |since| note.updated_at > since)
            })
            .cloned()
            .collect())
    }

    async fn create(&self, note: &NotePayload) -> Result<RemoteNote, RemoteError> {
        let _guard = self.begin(FakeCall::Create(note.content.clone())).await?;
        let mut state = self.state.lock().unwrap();
        let created = RemoteNote {
            id: state.next_id,
            content: note.content.clone(),
            kind: note.kind,
            is_archived: note.is_archived,
            updated_at: state.tick(),
        };
        state.next_id += 1;
        state.notes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        remote_id: i64,
        note: &NotePayload,
        base_updated_at: Option<i64>,
    ) -> Result<RemoteNote, RemoteError> {
        let _guard = self.begin(FakeCall::Update(remote_id)).await?;
        let mut state = self.state.lock().unwrap();
        let updated_at = state.tick();
        let Some(existing) = state.notes.get_mut(&remote_id) else {
            return Err(RemoteError::NotFound);
        };
        if base_updated_at.is_some_and(|base| base != existing.updated_at) {
            return Err(RemoteError::PreconditionFailed {
                current: Some(Box::new(existing.clone())),
            });
        }
        existing.content.clone_from(&note.content);
        existing.kind = note.kind;
        existing.is_archived = note.is_archived;
        existing.updated_at = updated_at;
        Ok(existing.clone())
    }

    async fn delete(&self, remote_id: i64) -> Result<(), RemoteError> {
        let _guard = self.begin(FakeCall::Delete(remote_id)).await?;
        let mut state = self.state.lock().unwrap();
        state
            .notes
            .remove(&remote_id)
            .map(|_| ())
            .ok_or(RemoteError::NotFound)
    }
}
