use thiserror::Error;

/// Errors raised while building a connector, before any I/O happens.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The upstream base URL could not be parsed.
    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be built (TLS backend, ...).
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
