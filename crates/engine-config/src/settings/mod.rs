use crate::{
    env::EnvManager,
    settings::{error::SettingsError, validator::SettingsValidator},
};
use serde::Serialize;
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

pub mod credentials;
pub mod error;
pub mod validator;

pub const KEY_BASE_URL: &str = "SCANEVENT_BASE_URL";
pub const KEY_LIMIT: &str = "SCANEVENT_LIMIT";
pub const KEY_POLLING_DELAY_MS: &str = "SCANEVENT_POLLING_DELAY_MS";
pub const KEY_WARMUP_DELAY_MS: &str = "SCANEVENT_WARMUP_DELAY_MS";
pub const KEY_WORKER_ID: &str = "SCANEVENT_WORKER_ID";
pub const KEY_REQUEST_TIMEOUT_MS: &str = "SCANEVENT_REQUEST_TIMEOUT_MS";
pub const KEY_STALE_RETRY: &str = "SCANEVENT_STALE_RETRY";
pub const KEY_COMMIT_MODE: &str = "SCANEVENT_COMMIT_MODE";
pub const KEY_STORE: &str = "SCANEVENT_STORE";
pub const KEY_DB_URL: &str = "SCANEVENT_DB_URL";
pub const KEY_DB_PASSWORD: &str = "SCANEVENT_DB_PASSWORD";
pub const KEY_SLED_PATH: &str = "SCANEVENT_SLED_PATH";

pub const DEFAULT_LIMIT: u32 = 100;
pub const DEFAULT_POLLING_DELAY_MS: u64 = 10_000;
pub const DEFAULT_WARMUP_DELAY_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const MAX_WORKER_ID_LEN: usize = 30;

/// What the poll loop does after a page it had to throw away (stale or out of order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StaleRetry {
    /// Wait the regular polling delay before asking again.
    #[default]
    Delay,
    /// Ask again straight away.
    Immediate,
}

impl FromStr for StaleRetry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delay" => Ok(StaleRetry::Delay),
            "immediate" => Ok(StaleRetry::Immediate),
            other => Err(format!("expected 'delay' or 'immediate', got '{other}'")),
        }
    }
}

/// How an event insert and its cursor write reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CommitMode {
    /// Insert and cursor advance share one transaction.
    #[default]
    Atomic,
    /// Insert, then advance. A crash in between is repaired by replay.
    TwoStep,
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(CommitMode::Atomic),
            "two-step" | "two_step" => Ok(CommitMode::TwoStep),
            other => Err(format!("expected 'atomic' or 'two-step', got '{other}'")),
        }
    }
}

/// Where ingested scans are kept.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Postgres { url: String },
    Sled { path: PathBuf },
    Memory,
}

impl StoreSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreSettings::Postgres { .. } => "postgres",
            StoreSettings::Sled { .. } => "sled",
            StoreSettings::Memory => "memory",
        }
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSettings::Postgres { url } => f
                .debug_struct("Postgres")
                .field("url", &credentials::redact_url(url))
                .finish(),
            StoreSettings::Sled { path } => f.debug_struct("Sled").field("path", path).finish(),
            StoreSettings::Memory => f.write_str("Memory"),
        }
    }
}

/// Settings the ingestion loop runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub worker_id: String,
    pub base_url: String,
    /// As configured; the poll loop clamps it to the page ceiling.
    pub limit: u32,
    pub polling_delay: Duration,
    pub warmup_delay: Duration,
    pub request_timeout: Duration,
    pub stale_retry: StaleRetry,
    pub commit_mode: CommitMode,
}

impl IngestSettings {
    /// Settings with defaults for everything but the identity and the endpoint.
    pub fn new(worker_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            base_url: base_url.into(),
            limit: DEFAULT_LIMIT,
            polling_delay: Duration::from_millis(DEFAULT_POLLING_DELAY_MS),
            warmup_delay: Duration::from_millis(DEFAULT_WARMUP_DELAY_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            stale_retry: StaleRetry::default(),
            commit_mode: CommitMode::default(),
        }
    }
}

/// Everything a worker process needs, validated.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub ingest: IngestSettings,
    pub store: StoreSettings,
}

impl WorkerSettings {
    pub fn from_env(env: &EnvManager) -> Result<Self, SettingsError> {
        SettingsValidator::new(env).validate()
    }
}
