use thiserror::Error;

/// Errors raised while loading or validating worker settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A `.env` file could not be read or parsed.
    #[error("Env file error: {0}")]
    EnvFile(String),

    /// One or more settings were missing or invalid.
    #[error("Invalid settings: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// The database URL asks for a password that was not supplied.
    #[error("Database URL contains {{password}} but {0} is not set")]
    MissingCredential(&'static str),

    /// No home directory to derive the default sled path from.
    #[error("Could not determine home directory for the default store path")]
    NoHomeDir,
}
