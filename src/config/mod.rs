//! Configuration system (layered: defaults < TOML file < env < setters).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WeaveError;
use crate::session::{CompactionConfig, SessionService};
use crate::util::retry::RetryPolicy;

/// Public Gemini API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Retry settings as they appear in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
            retry_statuses: policy.retry_statuses,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
            retry_statuses: self.retry_statuses.clone(),
        }
    }
}

/// Resolved settings for engines, sessions and the runner.
///
/// Environment variables:
/// `AGENTWEAVE_APP_NAME`, `AGENTWEAVE_MODEL`, `GOOGLE_API_KEY` / `GEMINI_API_KEY`,
/// `GEMINI_BASE_URL`, `AGENTWEAVE_DB`, `AGENTWEAVE_REQUEST_TIMEOUT`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    pub app_name: String,
    pub model: String,
    #[serde(skip_serializing)]
    api_key: Option<String>,
    pub base_url: String,
    /// SQLite file for durable sessions; `None` keeps sessions in memory.
    pub database_path: Option<PathBuf>,
    pub retry: RetryConfig,
    pub compaction: Option<CompactionConfig>,
    pub request_timeout_secs: u64,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            app_name: "default".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            database_path: None,
            retry: RetryConfig::default(),
            compaction: None,
            request_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for WeaveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeaveConfig")
            .field("app_name", &self.app_name)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("database_path", &self.database_path)
            .field("retry", &self.retry)
            .field("compaction", &self.compaction)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl WeaveConfig {
    /// Defaults overlaid with the environment (`.env` is loaded first if present).
    pub fn from_env() -> Result<Self, WeaveError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, WeaveError> {
        toml::from_str(raw).map_err(|e| WeaveError::Configuration(format!("invalid config: {e}")))
    }

    /// Read a TOML file, then overlay the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WeaveError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WeaveError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let _ = dotenvy::dotenv();
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `path` if given, else the per-user config file if it exists, else defaults;
    /// the environment is overlaid in every case.
    pub fn discover(path: Option<&Path>) -> Result<Self, WeaveError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(path),
                None => Self::from_env(),
            },
        }
    }

    /// Per-user config location, e.g. `~/.config/agentweave/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "agentweave", "agentweave")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from `lookup`, which maps variable names to values.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), WeaveError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(app_name) = get("AGENTWEAVE_APP_NAME") {
            self.app_name = app_name;
        }
        if let Some(model) = get("AGENTWEAVE_MODEL") {
            self.model = model;
        }
        if let Some(key) = get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(db) = get("AGENTWEAVE_DB") {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(raw) = get("AGENTWEAVE_REQUEST_TIMEOUT") {
            self.request_timeout_secs = raw.trim().parse().map_err(|_| {
                WeaveError::Configuration(format!(
                    "AGENTWEAVE_REQUEST_TIMEOUT must be a number of seconds, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) {
        self.api_key = Some(key.into());
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.set_api_key(key);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn with_compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = Some(compaction);
        self
    }

    pub fn validate(&self) -> Result<(), WeaveError> {
        if self.app_name.trim().is_empty() {
            return Err(WeaveError::Configuration("app_name must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(WeaveError::Configuration("model must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(WeaveError::Configuration(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(WeaveError::Configuration("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(WeaveError::Configuration("retry.multiplier must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(WeaveError::Configuration("request_timeout_secs must be positive".into()));
        }
        if let Some(compaction) = &self.compaction {
            compaction.validate()?;
        }
        Ok(())
    }

    /// Session service for this config: SQLite when `database_path` is set.
    pub fn session_service(&self) -> Result<SessionService, WeaveError> {
        let service = match &self.database_path {
            #[cfg(feature = "sqlite")]
            Some(path) => SessionService::sqlite(path)?,
            #[cfg(not(feature = "sqlite"))]
            Some(_) => {
                return Err(WeaveError::Configuration(
                    "database_path requires the `sqlite` feature".into(),
                ))
            }
            None => SessionService::in_memory(),
        };
        Ok(service.with_app_name(&self.app_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn google_key_wins_over_gemini_key() {
        let mut config = WeaveConfig::default();
        config
            .apply_env_from(env(&[("GEMINI_API_KEY", "g2"), ("GOOGLE_API_KEY", "g1")]))
            .unwrap();
        assert_eq!(config.api_key(), Some("g1"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = WeaveConfig::from_toml_str("model = \"from-file\"\napp_name = \"bank\"").unwrap();
        config
            .apply_env_from(env(&[("AGENTWEAVE_MODEL", "from-env")]))
            .unwrap();

        assert_eq!(config.model, "from-env");
        assert_eq!(config.app_name, "bank");
    }

    #[test]
    fn bad_timeout_is_a_configuration_error() {
        let mut config = WeaveConfig::default();
        let err = config
            .apply_env_from(env(&[("AGENTWEAVE_REQUEST_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("AGENTWEAVE_REQUEST_TIMEOUT"));
    }

    #[test]
    fn debug_never_prints_the_key() {
        let config = WeaveConfig::default().with_api_key("super-secret");
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn retry_config_maps_to_policy() {
        let policy = RetryConfig::default().to_policy();
        assert_eq!(policy, RetryPolicy::default());
    }
}
