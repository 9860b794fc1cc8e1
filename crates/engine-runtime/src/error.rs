use connectors::error::ConnectorError;
use engine_core::error::StoreError;
use engine_processing::error::IngestError;
use model::events::scan::EventId;
use thiserror::Error;

/// Fatal outcomes of the poll loop. Fetch failures never end up here.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Failed to initialise worker '{worker_id}': {source}")]
    Init {
        worker_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Persistence failed for worker '{worker_id}' at cursor {cursor}: {source}")]
    Persistence {
        worker_id: String,
        cursor: EventId,
        #[source]
        source: IngestError,
    },
}

/// Errors wiring a worker from its settings.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scan source error: {0}")]
    Source(#[from] ConnectorError),
}
