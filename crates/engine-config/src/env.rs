use crate::settings::error::SettingsError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Environment variable manager that loads from system and .env files
#[derive(Debug, Clone)]
pub struct EnvManager {
    vars: HashMap<String, String>,
    sensitive_patterns: Vec<String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Builds a manager from an explicit set of variables, ignoring the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            sensitive_patterns: Self::default_sensitive_patterns(),
        }
    }

    /// Load variables from a .env file. File values win over the process environment.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SettingsError::EnvFile(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Overrides a single value, e.g. from a command line flag.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Whether the key looks like it carries a secret.
    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.sensitive_patterns.iter().any(|p| key.contains(p))
    }

    /// Value suitable for logging: secrets are replaced by `***`.
    pub fn display_value(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| {
            if self.is_sensitive(key) {
                "***".to_string()
            } else {
                v.to_string()
            }
        })
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), SettingsError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    return Err(SettingsError::EnvFile(format!(
                        "Invalid env file: empty key at line {}",
                        line_num + 1
                    )));
                }

                self.vars
                    .insert(key.to_string(), Self::unquote_value(value));
            } else {
                return Err(SettingsError::EnvFile(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            }
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();

        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }

        value.to_string()
    }

    fn default_sensitive_patterns() -> Vec<String> {
        ["password", "passwd", "secret", "token", "credential", "private"]
            .iter()
            .map(|p| p.to_string())
            .collect()
    }
}

impl Default for EnvManager {
    fn default() -> Self {
        Self::new()
    }
}
