use crate::{
    error::StoreError,
    state::{
        CursorStore, EventStore, ScanQueries,
        memory::MemoryScanStore,
        models::{EventWrite, RawBatchWrite},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    events::scan::{EventId, ScanEvent, ScanEventType},
    pagination::cursor::WorkerCursor,
    records::batch::RawBatch,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory store that fails every event write after the first `allow`.
pub struct FaultyStore {
    pub inner: MemoryScanStore,
    allow: usize,
    writes: AtomicUsize,
}

impl FaultyStore {
    pub fn new(allow: usize) -> Self {
        Self {
            inner: MemoryScanStore::new(),
            allow,
            writes: AtomicUsize::new(0),
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.allow {
            return Err(StoreError::Connection("server closed the connection".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CursorStore for FaultyStore {
    async fn load_cursor(&self, worker_id: &str) -> Result<Option<WorkerCursor>, StoreError> {
        self.inner.load_cursor(worker_id).await
    }

    async fn advance_cursor(&self, worker_id: &str, event_id: EventId) -> Result<(), StoreError> {
        self.inner.advance_cursor(worker_id, event_id).await
    }
}

#[async_trait]
impl EventStore for FaultyStore {
    async fn record_raw_batch(&self, batch: &RawBatch) -> Result<RawBatchWrite, StoreError> {
        self.inner.record_raw_batch(batch).await
    }

    async fn insert_event(&self, event: &ScanEvent) -> Result<EventWrite, StoreError> {
        self.check()?;
        self.inner.insert_event(event).await
    }

    async fn insert_event_and_advance(
        &self,
        worker_id: &str,
        event: &ScanEvent,
    ) -> Result<EventWrite, StoreError> {
        self.check()?;
        self.inner.insert_event_and_advance(worker_id, event).await
    }
}

#[async_trait]
impl ScanQueries for FaultyStore {
    async fn latest_event(&self) -> Result<Option<ScanEvent>, StoreError> {
        self.inner.latest_event().await
    }

    async fn latest_event_of_type(
        &self,
        event_type: ScanEventType,
    ) -> Result<Option<ScanEvent>, StoreError> {
        self.inner.latest_event_of_type(event_type).await
    }

    async fn latest_event_for_parcel(&self, parcel_id: i64) -> Result<Option<ScanEvent>, StoreError> {
        self.inner.latest_event_for_parcel(parcel_id).await
    }

    async fn first_event_time(
        &self,
        parcel_id: i64,
        event_type: ScanEventType,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.first_event_time(parcel_id, event_type).await
    }
}
