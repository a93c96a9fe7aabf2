/*!
 * Configuration types for Fusion
 */

use fusion_connect::QueryLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{FusionError, Result};

/// Top-level configuration, one section per concern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend location and request limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Dashboard API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for request/response calls in seconds (not the live stream)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Per-collection `limit` sent with snapshot queries
    #[serde(default)]
    pub limits: QueryLimits,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            limits: QueryLimits::default(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Orchestrator cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Full snapshot refresh interval in seconds
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,

    /// Health probe interval in seconds
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Channel silence after which the live feed is considered stale
    #[serde(default = "default_channel_silence")]
    pub channel_silence_secs: u64,

    /// Error log entries kept in the status, newest first
    #[serde(default = "default_error_log_capacity")]
    pub error_log_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval(),
            health_interval_secs: default_health_interval(),
            channel_silence_secs: default_channel_silence(),
            error_log_capacity: default_error_log_capacity(),
        }
    }
}

impl SyncConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn channel_silence(&self) -> Duration {
        Duration::from_secs(self.channel_silence_secs)
    }
}

/// Where and how long snapshots are kept locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Cache directory (None = platform cache dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Key namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Schema version embedded in every key; bump to invalidate old data
    #[serde(default = "default_schema_version")]
    pub version: String,

    /// Freshness window in milliseconds
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            dir: None,
            namespace: default_namespace(),
            version: default_schema_version(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Configured directory, or `<platform cache dir>/fusion`
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("fusion")
        })
    }
}

/// Cache storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// One file per key in the cache directory
    #[default]
    File,

    /// Process-local, lost on exit
    Memory,
}

/// Diagnostic output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Shorthand for level = debug
    #[serde(default)]
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn effective_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.level
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Informational messages (default)
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_snapshot_interval() -> u64 {
    120
}

fn default_health_interval() -> u64 {
    3
}

fn default_channel_silence() -> u64 {
    30
}

fn default_error_log_capacity() -> usize {
    20
}

fn default_namespace() -> String {
    "fusion".to_string()
}

fn default_schema_version() -> String {
    "v1".to_string()
}

fn default_ttl_ms() -> u64 {
    90_000 // 90 seconds
}

impl FusionConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FusionError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: FusionConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| FusionError::Config(format!("Cannot serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api.base_url)
            .map_err(|e| FusionError::Config(format!("api.base_url is invalid: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FusionError::Config(format!(
                "api.base_url must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(FusionError::Config(
                "api.request_timeout_secs must be > 0".to_string(),
            ));
        }

        let limits = &self.api.limits;
        if limits.events == 0 || limits.assets == 0 || limits.alerts == 0 {
            return Err(FusionError::Config(
                "api.limits must all be > 0".to_string(),
            ));
        }

        if self.sync.snapshot_interval_secs == 0 {
            return Err(FusionError::Config(
                "sync.snapshot_interval_secs must be > 0".to_string(),
            ));
        }

        if self.sync.health_interval_secs == 0 {
            return Err(FusionError::Config(
                "sync.health_interval_secs must be > 0".to_string(),
            ));
        }

        if self.sync.error_log_capacity == 0 {
            return Err(FusionError::Config(
                "sync.error_log_capacity must be > 0".to_string(),
            ));
        }

        if self.cache.namespace.is_empty() || self.cache.version.is_empty() {
            return Err(FusionError::Config(
                "cache.namespace and cache.version must not be empty".to_string(),
            ));
        }

        if self.cache.namespace.contains(':') || self.cache.version.contains(':') {
            return Err(FusionError::Config(
                "cache.namespace and cache.version must not contain ':'".to_string(),
            ));
        }

        Ok(())
    }
}
