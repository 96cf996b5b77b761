//! Client configuration.
//!
//! `ClientConfig` bundles where the remote note API lives (`RemoteConfig`) and
//! how the sync engine retries and schedules drains (`SyncConfig`). Both are
//! plain JSON documents; every field has a default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::RetryPolicy;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 5 * 60 * 1_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_PERIODIC_INTERVAL_SECS: u64 = 60;

/// Env var overriding `remote.api_base_url`
pub const API_URL_ENV: &str = "JOT_API_URL";
/// Env var overriding `remote.auth_token`
pub const API_TOKEN_ENV: &str = "JOT_API_TOKEN";

/// Top-level client configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl ClientConfig {
    /// Parse a configuration document
    pub fn from_json_str(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Load a configuration file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config file at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let payload = std::fs::read_to_string(path)?;
        Self::from_json_str(&payload)
    }

    /// Apply `JOT_API_URL` / `JOT_API_TOKEN` on top of the file values
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = normalize_text_option(std::env::var(API_URL_ENV).ok()) {
            self.remote.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(std::env::var(API_TOKEN_ENV).ok()) {
            self.remote.auth_token = Some(token);
        }
        self
    }
}

/// Location and credentials of the remote note API
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("api_base_url", &self.api_base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RemoteConfig {
    /// Normalized base URL: trimmed, http(s) only, without trailing slash
    pub fn api_base_url(&self) -> Option<String> {
        let url = normalize_text_option(self.api_base_url.clone())?;
        if url.starts_with("http://") || url.starts_with("https://") {
            Some(url.trim_end_matches('/').to_string())
        } else {
            tracing::warn!("Ignoring api_base_url without http:// or https:// scheme");
            None
        }
    }

    pub fn auth_token(&self) -> Option<String> {
        normalize_text_option(self.auth_token.clone())
    }

    /// Check if a remote is configured
    pub fn is_configured(&self) -> bool {
        self.api_base_url().is_some()
    }
}

/// Retry and scheduling knobs of the sync engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    /// Failed attempts after which an entry stops being retried automatically
    pub max_attempts: u32,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    /// Per remote call timeout
    pub request_timeout_ms: u64,
    /// Periodic drain trigger; `None` disables it
    pub periodic_interval_secs: Option<u64>,
    /// Pull remote changes after a drain empties the queue
    pub pull_after_push: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_retry_delay_ms: DEFAULT_BASE_RETRY_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            periodic_interval_secs: Some(DEFAULT_PERIODIC_INTERVAL_SECS),
            pull_after_push: true,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::Config(
                "sync.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_retry_delay_ms < self.base_retry_delay_ms {
            return Err(Error::Config(
                "sync.max_retry_delay_ms must not be smaller than sync.base_retry_delay_ms"
                    .to_string(),
            ));
        }
        if self.periodic_interval_secs == Some(0) {
            return Err(Error::Config(
                "sync.periodic_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn periodic_interval(&self) -> Option<Duration> {
        self.periodic_interval_secs.map(Duration::from_secs)
    }
}

fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
