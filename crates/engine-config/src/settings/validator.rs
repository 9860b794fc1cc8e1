use crate::{
    env::EnvManager,
    settings::{
        CommitMode, DEFAULT_LIMIT, DEFAULT_POLLING_DELAY_MS, DEFAULT_REQUEST_TIMEOUT_MS,
        DEFAULT_WARMUP_DELAY_MS, IngestSettings, KEY_BASE_URL, KEY_COMMIT_MODE, KEY_DB_PASSWORD,
        KEY_DB_URL, KEY_LIMIT, KEY_POLLING_DELAY_MS, KEY_REQUEST_TIMEOUT_MS, KEY_SLED_PATH,
        KEY_STALE_RETRY, KEY_STORE, KEY_WARMUP_DELAY_MS, KEY_WORKER_ID, MAX_WORKER_ID_LEN,
        StaleRetry, StoreSettings, WorkerSettings, credentials::resolve_db_url,
        error::SettingsError,
    },
};
use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::{info, warn};

/// Turns raw environment values into [`WorkerSettings`], collecting every problem
/// before failing.
pub struct SettingsValidator<'a> {
    env: &'a EnvManager,
}

impl<'a> SettingsValidator<'a> {
    pub fn new(env: &'a EnvManager) -> Self {
        Self { env }
    }

    pub fn validate(&self) -> Result<WorkerSettings, SettingsError> {
        let mut errors: Vec<String> = Vec::new();

        let worker_id = self.validate_worker_id(&mut errors);
        let base_url = self.validate_base_url(&mut errors);
        let limit = self.parse_or(KEY_LIMIT, DEFAULT_LIMIT, &mut errors);
        if limit == 0 {
            errors.push(format!("{KEY_LIMIT} must be greater than zero"));
        }

        let polling_delay_ms = self.parse_or(KEY_POLLING_DELAY_MS, DEFAULT_POLLING_DELAY_MS, &mut errors);
        let mut warmup_delay_ms = self.parse_or(KEY_WARMUP_DELAY_MS, DEFAULT_WARMUP_DELAY_MS, &mut errors);
        if warmup_delay_ms > polling_delay_ms {
            warn!(
                warmup_delay_ms,
                polling_delay_ms, "Warmup delay exceeds the polling delay; using the polling delay"
            );
            warmup_delay_ms = polling_delay_ms;
        }

        let request_timeout_ms =
            self.parse_or(KEY_REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS, &mut errors);
        if request_timeout_ms == 0 {
            errors.push(format!("{KEY_REQUEST_TIMEOUT_MS} must be greater than zero"));
        }

        let stale_retry = self.parse_or(KEY_STALE_RETRY, StaleRetry::default(), &mut errors);
        let commit_mode = self.parse_or(KEY_COMMIT_MODE, CommitMode::default(), &mut errors);
        let store = self.validate_store(&mut errors)?;

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }

        let settings = WorkerSettings {
            ingest: IngestSettings {
                worker_id,
                base_url,
                limit,
                polling_delay: Duration::from_millis(polling_delay_ms),
                warmup_delay: Duration::from_millis(warmup_delay_ms),
                request_timeout: Duration::from_millis(request_timeout_ms),
                stale_retry,
                commit_mode,
            },
            store,
        };

        info!("Settings validation completed successfully");
        info!("{settings:#?}");
        Ok(settings)
    }

    fn validate_worker_id(&self, errors: &mut Vec<String>) -> String {
        match self.env.get(KEY_WORKER_ID) {
            Some(id) if id.trim().len() > MAX_WORKER_ID_LEN => {
                errors.push(format!(
                    "{KEY_WORKER_ID} must be at most {MAX_WORKER_ID_LEN} characters"
                ));
                String::new()
            }
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => {
                errors.push(format!("{KEY_WORKER_ID} is required"));
                String::new()
            }
        }
    }

    fn validate_base_url(&self, errors: &mut Vec<String>) -> String {
        match self.env.get(KEY_BASE_URL) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim().to_string()
            }
            Some(url) => {
                errors.push(format!("{KEY_BASE_URL} must be an http(s) URL, got '{url}'"));
                String::new()
            }
            None => {
                errors.push(format!("{KEY_BASE_URL} is required"));
                String::new()
            }
        }
    }

    fn validate_store(&self, errors: &mut Vec<String>) -> Result<StoreSettings, SettingsError> {
        let kind = self.env.get(KEY_STORE).unwrap_or("postgres").to_ascii_lowercase();
        match kind.as_str() {
            "postgres" | "pg" | "postgresql" => match self.env.get(KEY_DB_URL) {
                Some(template) => {
                    let url =
                        resolve_db_url(template, self.env.get(KEY_DB_PASSWORD), KEY_DB_PASSWORD)?;
                    Ok(StoreSettings::Postgres { url })
                }
                None => {
                    errors.push(format!("{KEY_DB_URL} is required for the postgres store"));
                    Ok(StoreSettings::Memory)
                }
            },
            "sled" => {
                let path = match self.env.get(KEY_SLED_PATH) {
                    Some(path) => PathBuf::from(path),
                    None => default_sled_path()?,
                };
                Ok(StoreSettings::Sled { path })
            }
            "memory" => {
                warn!("Using the in-memory store; nothing will survive a restart");
                Ok(StoreSettings::Memory)
            }
            other => {
                errors.push(format!(
                    "{KEY_STORE} must be one of postgres, sled, memory; got '{other}'"
                ));
                Ok(StoreSettings::Memory)
            }
        }
    }

    fn parse_or<T>(&self, key: &str, default: T, errors: &mut Vec<String>) -> T
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.env.get(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
                errors.push(format!("{key} has an invalid value '{raw}': {e}"));
                default
            }),
        }
    }
}

/// `~/.scantrack/state`
pub fn default_sled_path() -> Result<PathBuf, SettingsError> {
    let home = dirs::home_dir().ok_or(SettingsError::NoHomeDir)?;
    Ok(home.join(".scantrack/state"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (KEY_WORKER_ID, "W_AKL"),
            (KEY_BASE_URL, "http://localhost:5000/v1/scans/scanevents"),
            (KEY_STORE, "sled"),
            (KEY_SLED_PATH, "/tmp/scantrack-test"),
        ]
    }

    fn validate(vars: Vec<(&'static str, &'static str)>) -> Result<WorkerSettings, SettingsError> {
        WorkerSettings::from_env(&EnvManager::from_vars(vars))
    }

    #[test]
    fn applies_defaults() {
        let settings = validate(base_vars()).unwrap();
        let ingest = settings.ingest;
        assert_eq!(ingest.worker_id, "W_AKL");
        assert_eq!(ingest.limit, DEFAULT_LIMIT);
        assert_eq!(ingest.polling_delay, Duration::from_millis(DEFAULT_POLLING_DELAY_MS));
        assert_eq!(ingest.warmup_delay, Duration::from_millis(DEFAULT_WARMUP_DELAY_MS));
        assert_eq!(ingest.stale_retry, StaleRetry::Delay);
        assert_eq!(ingest.commit_mode, CommitMode::Atomic);
        assert_eq!(
            settings.store,
            StoreSettings::Sled {
                path: PathBuf::from("/tmp/scantrack-test")
            }
        );
    }

    #[test]
    fn oversized_limit_is_accepted_as_configured() {
        let mut vars = base_vars();
        vars.push((KEY_LIMIT, "10000"));
        assert_eq!(validate(vars).unwrap().ingest.limit, 10_000);
    }

    #[test]
    fn collects_every_problem() {
        let vars = vec![
            (KEY_LIMIT, "lots"),
            (KEY_STALE_RETRY, "sometimes"),
            (KEY_STORE, "sled"),
            (KEY_SLED_PATH, "/tmp/scantrack-test"),
        ];
        let err = validate(vars).unwrap_err();
        match err {
            SettingsError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 4, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains(KEY_WORKER_ID)));
                assert!(errors.iter().any(|e| e.contains(KEY_BASE_URL)));
                assert!(errors.iter().any(|e| e.contains(KEY_LIMIT)));
                assert!(errors.iter().any(|e| e.contains(KEY_STALE_RETRY)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_long_worker_ids_and_zero_limits() {
        let vars = vec![
            (KEY_WORKER_ID, "W_THIS_WORKER_NAME_IS_FAR_TOO_LONG"),
            (KEY_BASE_URL, "http://localhost"),
            (KEY_LIMIT, "0"),
            (KEY_STORE, "memory"),
        ];
        let err = validate(vars).unwrap_err();
        assert!(matches!(err, SettingsError::ValidationFailed(ref e) if e.len() == 2));
    }

    #[test]
    fn postgres_url_takes_password_from_env() {
        let vars = vec![
            (KEY_WORKER_ID, "W_AKL"),
            (KEY_BASE_URL, "https://scans.example.com/v1/scans/scanevents"),
            (KEY_DB_URL, "postgres://scan:{password}@db/scans"),
            (KEY_DB_PASSWORD, "s3cret"),
            (KEY_COMMIT_MODE, "two-step"),
            (KEY_STALE_RETRY, "immediate"),
        ];
        let settings = validate(vars).unwrap();
        assert_eq!(
            settings.store,
            StoreSettings::Postgres {
                url: "postgres://scan:s3cret@db/scans".into()
            }
        );
        assert!(!format!("{:?}", settings.store).contains("s3cret"));
        assert_eq!(settings.ingest.commit_mode, CommitMode::TwoStep);
        assert_eq!(settings.ingest.stale_retry, StaleRetry::Immediate);
    }

    #[test]
    fn postgres_requires_password_when_templated() {
        let vars = vec![
            (KEY_WORKER_ID, "W_AKL"),
            (KEY_BASE_URL, "http://localhost"),
            (KEY_DB_URL, "postgres://scan:{password}@db/scans"),
        ];
        assert!(matches!(
            validate(vars),
            Err(SettingsError::MissingCredential(KEY_DB_PASSWORD))
        ));
    }

    #[test]
    fn warmup_never_exceeds_polling_delay() {
        let mut vars = base_vars();
        vars.push((KEY_POLLING_DELAY_MS, "200"));
        vars.push((KEY_WARMUP_DELAY_MS, "5000"));
        let settings = validate(vars).unwrap();
        assert_eq!(settings.ingest.warmup_delay, Duration::from_millis(200));
    }
}
