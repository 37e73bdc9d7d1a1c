//! Session configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Result cache settings.
///
/// The cache is per-session: each session constructs its own store, so cache
/// lifetime equals session lifetime.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Whether successful call results are memoized at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds a stored result stays retrievable.
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

/// Client identity advertised to the worker during the `initialize` handshake.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientIdentity {
    /// Client name sent in `clientInfo`.
    #[serde(default = "default_client_name")]
    pub name: String,
    /// Client version sent in `clientInfo`.
    #[serde(default = "default_client_version")]
    pub version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            version: default_client_version(),
        }
    }
}

fn default_client_name() -> String {
    "toolwire".into()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn default_session_timeout_seconds() -> u64 {
    30
}

/// Session configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Worker binary launched for the session (e.g. `node`).
    pub worker_cmd: String,
    /// Arguments passed to the worker binary (e.g. the server script path).
    #[serde(default)]
    pub worker_args: Vec<String>,
    /// Whole-session lifetime bound in seconds. When it elapses the worker
    /// is terminated and every outstanding call is abandoned.
    #[serde(default = "default_session_timeout_seconds")]
    pub session_timeout_seconds: u64,
    /// Per-call timeout in seconds; 0 disables it, matching the historic
    /// behavior of relying on the session bound alone.
    #[serde(default)]
    pub call_timeout_seconds: u64,
    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Identity advertised during the handshake.
    #[serde(default)]
    pub client: ClientIdentity,
}

impl SessionConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration for a worker command with all defaults applied.
    #[must_use]
    pub fn for_worker(cmd: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            worker_cmd: cmd.into(),
            worker_args: args,
            session_timeout_seconds: default_session_timeout_seconds(),
            call_timeout_seconds: 0,
            cache: CacheConfig::default(),
            client: ClientIdentity::default(),
        }
    }

    /// Whole-session lifetime bound.
    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_seconds)
    }

    /// Per-call timeout, or `None` when disabled.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        if self.call_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.call_timeout_seconds))
        }
    }

    /// Time-to-live applied to cached results.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.worker_cmd.trim().is_empty() {
            return Err(AppError::Config("worker_cmd must not be empty".into()));
        }

        if self.session_timeout_seconds == 0 {
            return Err(AppError::Config(
                "session_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(AppError::Config(
                "cache.ttl_seconds must be greater than zero when the cache is enabled".into(),
            ));
        }

        Ok(())
    }
}
