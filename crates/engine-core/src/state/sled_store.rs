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
use sled::{
    Transactional,
    transaction::{ConflictableTransactionResult, TransactionError},
};
use std::path::Path;
use tracing::debug;

const TREE_CURSORS: &str = "cursors";
const TREE_RAW_BATCHES: &str = "raw_batches";
const TREE_EVENTS: &str = "events";

/// Embedded store for single-host deployments.
///
/// Event keys are big-endian ids so the `events` tree iterates in id order.
pub struct SledScanStore {
    db: sled::Db,
    cursors: sled::Tree,
    raw_batches: sled::Tree,
    events: sled::Tree,
}

impl SledScanStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let cursors = db.open_tree(TREE_CURSORS)?;
        let raw_batches = db.open_tree(TREE_RAW_BATCHES)?;
        let events = db.open_tree(TREE_EVENTS)?;
        Ok(Self {
            db,
            cursors,
            raw_batches,
            events,
        })
    }

    #[inline]
    fn event_key(event_id: EventId) -> [u8; 8] {
        event_id.to_be_bytes()
    }

    #[inline]
    fn raw_key(worker_id: &str, first_event_id: EventId) -> Vec<u8> {
        let mut key = Vec::with_capacity(worker_id.len() + 9);
        key.extend_from_slice(worker_id.as_bytes());
        key.push(0);
        key.extend_from_slice(&first_event_id.to_be_bytes());
        key
    }

    fn decode_events(&self) -> impl Iterator<Item = Result<ScanEvent, StoreError>> + '_ {
        self.events.iter().values().map(|value| {
            let bytes = value?;
            Ok(bincode::deserialize::<ScanEvent>(&bytes)?)
        })
    }

    fn scan_events<F>(&self, keep: F) -> Result<Vec<ScanEvent>, StoreError>
    where
        F: Fn(&ScanEvent) -> bool,
    {
        let mut matched = Vec::new();
        for event in self.decode_events() {
            let event = event?;
            if keep(&event) {
                matched.push(event);
            }
        }
        Ok(matched)
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl CursorStore for SledScanStore {
    async fn load_cursor(&self, worker_id: &str) -> Result<Option<WorkerCursor>, StoreError> {
        match self.cursors.get(worker_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn advance_cursor(&self, worker_id: &str, event_id: EventId) -> Result<(), StoreError> {
        let value = bincode::serialize(&WorkerCursor::new(worker_id, event_id))?;
        self.cursors.insert(worker_id.as_bytes(), value)?;
        debug!(worker_id, event_id, "Cursor written.");
        Ok(())
    }
}

#[async_trait]
impl EventStore for SledScanStore {
    async fn record_raw_batch(&self, batch: &RawBatch) -> Result<RawBatchWrite, StoreError> {
        let key = Self::raw_key(&batch.worker_id, batch.first_event_id);
        let value = bincode::serialize(batch)?;

        // compare_and_swap against "absent" keeps the first write.
        match self
            .raw_batches
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?
        {
            Ok(()) => Ok(RawBatchWrite::Recorded),
            Err(_) => Ok(RawBatchWrite::Duplicate),
        }
    }

    async fn insert_event(&self, event: &ScanEvent) -> Result<EventWrite, StoreError> {
        let key = Self::event_key(event.event_id);
        let value = bincode::serialize(event)?;

        match self
            .events
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?
        {
            Ok(()) => Ok(EventWrite::Inserted),
            Err(_) => Ok(EventWrite::AlreadyPresent),
        }
    }

    async fn insert_event_and_advance(
        &self,
        worker_id: &str,
        event: &ScanEvent,
    ) -> Result<EventWrite, StoreError> {
        let key = Self::event_key(event.event_id);
        let value = bincode::serialize(event)?;
        let cursor = bincode::serialize(&WorkerCursor::new(worker_id, event.event_id))?;

        let result = (&self.events, &self.cursors).transaction(
            |(events, cursors)| -> ConflictableTransactionResult<EventWrite, StoreError> {
                let written = if events.get(&key[..])?.is_some() {
                    EventWrite::AlreadyPresent
                } else {
                    events.insert(&key[..], value.as_slice())?;
                    EventWrite::Inserted
                };
                cursors.insert(worker_id.as_bytes(), cursor.as_slice())?;
                Ok(written)
            },
        );

        match result {
            Ok(written) => Ok(written),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(StoreError::Sled(err)),
        }
    }
}

#[async_trait]
impl ScanQueries for SledScanStore {
    async fn latest_event(&self) -> Result<Option<ScanEvent>, StoreError> {
        match self.events.last()? {
            Some((_, bytes)) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn latest_event_of_type(
        &self,
        event_type: ScanEventType,
    ) -> Result<Option<ScanEvent>, StoreError> {
        let matched = self.scan_events(|e| e.event_type == event_type)?;
        Ok(most_recent(matched.iter()))
    }

    async fn latest_event_for_parcel(
        &self,
        parcel_id: i64,
    ) -> Result<Option<ScanEvent>, StoreError> {
        let matched = self.scan_events(|e| e.parcel_id == parcel_id)?;
        Ok(most_recent(matched.iter()))
    }

    async fn first_event_time(
        &self,
        parcel_id: i64,
        event_type: ScanEventType,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let matched =
            self.scan_events(|e| e.parcel_id == parcel_id && e.event_type == event_type)?;
        Ok(matched.iter().map(|e| e.created_at).min())
    }
}
