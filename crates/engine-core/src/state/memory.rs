use crate::{
    error::StoreError,
    state::{
        CursorStore, EventStore, ScanQueries,
        models::{EventWrite, RawBatchWrite},
        most_recent,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    events::scan::{EventId, ScanEvent, ScanEventType},
    pagination::cursor::WorkerCursor,
    records::batch::RawBatch,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    cursors: HashMap<String, WorkerCursor>,
    raw_batches: BTreeMap<(String, EventId), RawBatch>,
    events: BTreeMap<EventId, ScanEvent>,
    insert_order: Vec<EventId>,
}

/// Process-local store. Nothing survives a restart; used for dry runs against an
/// upstream and as the fixture store in tests.
#[derive(Default)]
pub struct MemoryScanStore {
    state: Mutex<MemoryState>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event ids in the order they were first inserted.
    pub async fn insert_order(&self) -> Vec<EventId> {
        self.state.lock().await.insert_order.clone()
    }

    pub async fn events(&self) -> Vec<ScanEvent> {
        self.state.lock().await.events.values().cloned().collect()
    }

    pub async fn raw_batches(&self, worker_id: &str) -> Vec<RawBatch> {
        self.state
            .lock()
            .await
            .raw_batches
            .values()
            .filter(|batch| batch.worker_id == worker_id)
            .cloned()
            .collect()
    }
}

impl MemoryState {
    fn insert(&mut self, event: &ScanEvent) -> EventWrite {
        if self.events.contains_key(&event.event_id) {
            return EventWrite::AlreadyPresent;
        }
        self.events.insert(event.event_id, event.clone());
        self.insert_order.push(event.event_id);
        EventWrite::Inserted
    }

    fn set_cursor(&mut self, worker_id: &str, event_id: EventId) {
        self.cursors
            .insert(worker_id.to_string(), WorkerCursor::new(worker_id, event_id));
    }
}

#[async_trait]
impl CursorStore for MemoryScanStore {
    async fn load_cursor(&self, worker_id: &str) -> Result<Option<WorkerCursor>, StoreError> {
        Ok(self.state.lock().await.cursors.get(worker_id).cloned())
    }

    async fn advance_cursor(&self, worker_id: &str, event_id: EventId) -> Result<(), StoreError> {
        self.state.lock().await.set_cursor(worker_id, event_id);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryScanStore {
    async fn record_raw_batch(&self, batch: &RawBatch) -> Result<RawBatchWrite, StoreError> {
        let mut state = self.state.lock().await;
        let key = (batch.worker_id.clone(), batch.first_event_id);
        if state.raw_batches.contains_key(&key) {
            return Ok(RawBatchWrite::Duplicate);
        }
        state.raw_batches.insert(key, batch.clone());
        Ok(RawBatchWrite::Recorded)
    }

    async fn insert_event(&self, event: &ScanEvent) -> Result<EventWrite, StoreError> {
        Ok(self.state.lock().await.insert(event))
    }

    async fn insert_event_and_advance(
        &self,
        worker_id: &str,
        event: &ScanEvent,
    ) -> Result<EventWrite, StoreError> {
        let mut state = self.state.lock().await;
        let written = state.insert(event);
        state.set_cursor(worker_id, event.event_id);
        Ok(written)
    }
}

#[async_trait]
impl ScanQueries for MemoryScanStore {
    async fn latest_event(&self) -> Result<Option<ScanEvent>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .events
            .values()
            .next_back()
            .cloned())
    }

    async fn latest_event_of_type(
        &self,
        event_type: ScanEventType,
    ) -> Result<Option<ScanEvent>, StoreError> {
        let state = self.state.lock().await;
        Ok(most_recent(
            state.events.values().filter(|e| e.event_type == event_type),
        ))
    }

    async fn latest_event_for_parcel(
        &self,
        parcel_id: i64,
    ) -> Result<Option<ScanEvent>, StoreError> {
        let state = self.state.lock().await;
        Ok(most_recent(
            state.events.values().filter(|e| e.parcel_id == parcel_id),
        ))
    }

    async fn first_event_time(
        &self,
        parcel_id: i64,
        event_type: ScanEventType,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .values()
            .filter(|e| e.parcel_id == parcel_id && e.event_type == event_type)
            .map(|e| e.created_at)
            .min())
    }
}
