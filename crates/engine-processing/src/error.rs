use engine_core::error::StoreError;
use model::events::scan::EventId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to record raw batch starting at event {first_event_id}: {source}")]
    RawBatch {
        first_event_id: EventId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to persist scan event {event_id}: {source}")]
    Event {
        event_id: EventId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to advance cursor of worker '{worker_id}' to {event_id}: {source}")]
    Cursor {
        worker_id: String,
        event_id: EventId,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            IngestError::RawBatch { source, .. }
            | IngestError::Event { source, .. }
            | IngestError::Cursor { source, .. } => source,
        }
    }
}
