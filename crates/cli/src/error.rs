use engine_config::settings::error::SettingsError;
use engine_core::error::{FetchError, StoreError};
use engine_runtime::error::{PollError, SetupError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to set up the worker: {0}")]
    Setup(#[from] SetupError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scan source error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Worker stopped: {0}")]
    Poll(#[from] PollError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}
