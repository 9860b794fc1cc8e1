use crate::{
    error::StoreError,
    state::models::{EventWrite, RawBatchWrite, StoreSummary},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    events::scan::{EventId, ScanEvent, ScanEventType},
    pagination::cursor::WorkerCursor,
    records::batch::RawBatch,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod faulty;
pub mod memory;
pub mod models;
pub mod sled_store;

/// Durable mapping of worker identity to the last ingested event id.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load_cursor(&self, worker_id: &str) -> Result<Option<WorkerCursor>, StoreError>;

    /// Creates the cursor row if absent, otherwise overwrites it.
    ///
    /// The store does not reject a value lower than the current one; the ingest
    /// pipeline only ever moves forward, and `set-cursor` relies on rewinds.
    async fn advance_cursor(&self, worker_id: &str, event_id: EventId) -> Result<(), StoreError>;

    /// Last ingested event id, or 0 when the worker has no cursor yet.
    async fn get_cursor(&self, worker_id: &str) -> Result<EventId, StoreError> {
        Ok(self
            .load_cursor(worker_id)
            .await?
            .map(|cursor| cursor.last_event_id)
            .unwrap_or(0))
    }
}

/// Write side used by the ingest pipeline.
#[async_trait]
pub trait EventStore: CursorStore {
    /// Records the raw batch unless one with the same `(worker_id, first_event_id)` exists.
    async fn record_raw_batch(&self, batch: &RawBatch) -> Result<RawBatchWrite, StoreError>;

    /// Inserts the event keyed by its unique id. A second insert of the same id is a no-op.
    async fn insert_event(&self, event: &ScanEvent) -> Result<EventWrite, StoreError>;

    /// Inserts the event and moves the worker's cursor to its id in one transaction.
    async fn insert_event_and_advance(
        &self,
        worker_id: &str,
        event: &ScanEvent,
    ) -> Result<EventWrite, StoreError>;
}

/// Read side: the lookups operators run against ingested scans.
#[async_trait]
pub trait ScanQueries: Send + Sync {
    /// Event with the highest id.
    async fn latest_event(&self) -> Result<Option<ScanEvent>, StoreError>;

    /// Most recent event of a type, by creation time.
    async fn latest_event_of_type(
        &self,
        event_type: ScanEventType,
    ) -> Result<Option<ScanEvent>, StoreError>;

    /// Most recent event of a parcel, by creation time.
    async fn latest_event_for_parcel(&self, parcel_id: i64)
    -> Result<Option<ScanEvent>, StoreError>;

    /// Earliest creation time of an event of the given type for a parcel.
    async fn first_event_time(
        &self,
        parcel_id: i64,
        event_type: ScanEventType,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn summary(&self) -> Result<StoreSummary, StoreError> {
        Ok(StoreSummary {
            latest: self.latest_event().await?,
            latest_pickup: self.latest_event_of_type(ScanEventType::Pickup).await?,
            latest_delivery: self.latest_event_of_type(ScanEventType::Delivery).await?,
        })
    }
}

/// Everything the worker needs from a storage back-end.
pub trait ScanStore: EventStore + ScanQueries {}

impl<T: EventStore + ScanQueries + ?Sized> ScanStore for T {}

/// Picks the entry with the latest creation time, ties going to the higher event id.
pub(crate) fn most_recent<'a>(events: impl Iterator<Item = &'a ScanEvent>) -> Option<ScanEvent> {
    events
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.event_id.cmp(&b.event_id))
        })
        .cloned()
}
