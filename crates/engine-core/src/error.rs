use thiserror::Error;

/// Failures while talking to the upstream scan event feed.
///
/// All variants are transient from the poll loop's point of view.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection refused, reset, timed out, ...
    #[error("Transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream answered with a non-success status.
    #[error("Upstream returned {status} {reason} for {url}")]
    Protocol {
        url: String,
        status: u16,
        reason: String,
    },

    /// The body could not be decoded as a scan event envelope.
    #[error("Malformed scan event payload: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport { .. } => "transport",
            FetchError::Protocol { .. } => "protocol",
            FetchError::Decode { .. } => "decode",
        }
    }
}

/// Failures of the durable store. Never retried once the worker is running.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to encode or decode a stored record: {0}")]
    Codec(#[from] bincode::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to open a store session: {0}")]
    Connection(String),

    #[error("Corrupt record in store: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether opening the store may succeed on a later attempt.
    pub fn is_connect_retryable(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::Postgres(err) => err.as_db_error().is_none(),
            _ => false,
        }
    }
}
