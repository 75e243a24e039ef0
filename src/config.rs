//! Configuration file parser for ~/.config/feedward/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FetchOptions, FetcherConfig};
use crate::ingest::IngestSettings;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-attempt fetch timeout, redirects included.
    pub fetch_timeout_secs: u64,

    /// Retries after the first attempt for 5xx, timeout and network errors.
    pub fetch_retries: u32,

    pub max_redirects: usize,

    /// Base delay of the exponential backoff between retries.
    pub retry_backoff_ms: u64,

    /// Largest response body accepted.
    pub max_feed_bytes: usize,

    pub user_agent: String,

    /// Hosts exempt from the private-address check (internal mirrors).
    pub allowed_private_hosts: Vec<String>,

    /// Maximum feeds fetched at once during a batch refresh.
    pub refresh_concurrency: usize,

    /// Unsaved items kept per feed (0 = unlimited).
    pub retention_cap_per_feed: u64,

    /// Overall budget for a batch refresh (0 = no deadline).
    pub refresh_deadline_secs: u64,

    /// SQLite database file. Defaults to `feedward.db` next to the config file.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 20,
            fetch_retries: 2,
            max_redirects: 5,
            retry_backoff_ms: 500,
            max_feed_bytes: 10 * 1024 * 1024,
            user_agent: concat!("feedward/", env!("CARGO_PKG_VERSION")).to_string(),
            allowed_private_hosts: Vec::new(),
            refresh_concurrency: 8,
            retention_cap_per_feed: 1000,
            refresh_deadline_secs: 120,
            database_path: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "fetch_timeout_secs",
        "fetch_retries",
        "max_redirects",
        "retry_backoff_ms",
        "max_feed_bytes",
        "user_agent",
        "allowed_private_hosts",
        "refresh_concurrency",
        "retention_cap_per_feed",
        "refresh_deadline_secs",
        "database_path",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to bound memory use.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content, path)
    }

    fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            path = %path.display(),
            concurrency = config.refresh_concurrency,
            retention_cap = config.retention_cap_per_feed,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Fetch limits with no cache validators.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            etag: None,
            last_modified: None,
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            retries: self.fetch_retries,
            max_redirects: self.max_redirects,
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            user_agent: self.user_agent.clone(),
            allowed_private_hosts: self.allowed_private_hosts.clone(),
            max_feed_bytes: self.max_feed_bytes,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            fetch: self.fetch_options(),
            concurrency: self.refresh_concurrency.max(1),
            retention_cap: self.retention_cap_per_feed,
            deadline: (self.refresh_deadline_secs > 0)
                .then(|| Duration::from_secs(self.refresh_deadline_secs)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
