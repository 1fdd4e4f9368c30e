//! Configuration module for Nuntia.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{NuntiaError, Result};

/// Database path used when running on an ephemeral serverless filesystem.
pub const SERVERLESS_DB_PATH: &str = "/tmp/nuntia.db";

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file (or a connection URL for Postgres).
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/nuntia.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the database path for the current environment.
    ///
    /// `NUNTIA_DATABASE_PATH` wins. Otherwise serverless platforms (Vercel,
    /// AWS Lambda) only have `/tmp` writable, so the database is placed there.
    pub fn resolve_path<F>(&self, env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env("NUNTIA_DATABASE_PATH").filter(|p| !p.is_empty()) {
            return path;
        }
        let is_vercel = env("VERCEL").as_deref() == Some("1");
        let is_lambda = env("AWS_LAMBDA_FUNCTION_NAME").is_some_and(|v| !v.is_empty());
        if is_vercel || is_lambda {
            return SERVERLESS_DB_PATH.to_string();
        }
        self.path.clone()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/nuntia.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed fetching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Maximum length of the plain-text content snippet, in characters.
    #[serde(default = "default_max_snippet_length")]
    pub max_snippet_length: usize,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow loopback/private hosts (local development and tests).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_read_timeout() -> u64 {
    10
}

fn default_total_timeout() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_snippet_length() -> usize {
    10000
}

fn default_user_agent() -> String {
    format!("Nuntia/{} (RSS Reader)", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            max_snippet_length: default_max_snippet_length(),
            user_agent: default_user_agent(),
            allow_private_hosts: false,
        }
    }
}

impl FetchConfig {
    /// Total request timeout.
    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }
}

/// Sync orchestration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Periodic refresh interval in seconds.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// Number of feeds synced in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Maximum number of items taken from one feed document.
    #[serde(default = "default_max_stories_per_feed")]
    pub max_stories_per_feed: usize,
    /// Timeout for one feed's store merge, in seconds.
    #[serde(default = "default_merge_timeout")]
    pub merge_timeout_secs: u64,
    /// Fill missing categories with keyword-inferred topics.
    #[serde(default)]
    pub infer_topics: bool,
}

fn default_sync_interval() -> u64 {
    900 // 15 minutes
}

fn default_concurrency() -> usize {
    4
}

fn default_max_stories_per_feed() -> usize {
    50
}

fn default_merge_timeout() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            concurrency: default_concurrency(),
            max_stories_per_feed: default_max_stories_per_feed(),
            merge_timeout_secs: default_merge_timeout(),
            infer_topics: false,
        }
    }
}

impl SyncConfig {
    /// Merge timeout.
    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(self.merge_timeout_secs)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed fetching configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Sync configuration.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(NuntiaError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| NuntiaError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `NUNTIA_DATABASE_PATH`: Override the database path
    /// - `VERCEL` / `AWS_LAMBDA_FUNCTION_NAME`: Move the database to `/tmp`
    /// - `NUNTIA_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.database.path = self.database.resolve_path(&env);

        if let Some(level) = env("NUNTIA_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.total_timeout_secs == 0 {
            return Err(NuntiaError::Config(
                "fetch.total_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.concurrency == 0 {
            return Err(NuntiaError::Config(
                "sync.concurrency must be greater than 0".to_string(),
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(NuntiaError::Config(
                "sync.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.database.path.is_empty() {
            return Err(NuntiaError::Config("database.path is empty".to_string()));
        }
        Ok(())
    }
}
