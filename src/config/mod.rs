//! Configuration management for the exporter
//!
//! Two layers are resolved here:
//! - [`Config`]: tuning knobs loaded from an optional TOML settings file
//!   (logging, source timeouts, retry policy), falling back to defaults
//! - [`RunSettings`]: the five required values read from the environment,
//!   validated into an immutable [`RunContext`] once per run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ExportError, Result};

/// Environment variable holding the MongoDB connection string
pub const ENV_SOURCE_CONNECTION_STRING: &str = "MONGO_CONNECTION_STRING";

/// Environment variable holding the source database name
pub const ENV_SOURCE_DATABASE: &str = "MONGO_DATABASE_NAME";

/// Environment variable holding the source collection name
pub const ENV_SOURCE_COLLECTION: &str = "MONGO_COLLECTION_NAME";

/// Environment variable holding the blob storage connection string
pub const ENV_SINK_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";

/// Environment variable holding the target container name
pub const ENV_SINK_CONTAINER: &str = "AZURE_STORAGE_CONTAINER_NAME";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Source connection configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Connect retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Source (MongoDB) connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// How long the driver may search for a usable server, in milliseconds
    #[serde(default = "default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,

    /// TCP connect timeout, in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Retry configuration for the connect step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of connect attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

// Default value functions
fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

fn default_server_selection_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1_000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            server_selection_timeout_ms: default_server_selection_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            app_name: default_app_name(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Parsed configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::config_invalid(format!(
                "Failed to read settings file {}",
                path.display()
            ))
            .with_source(e)
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration for this process
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present; otherwise defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let default_path = Self::default_path();
        if default_path.is_file() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(env!("CARGO_PKG_NAME"))
            .join("config.toml")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(ExportError::config_invalid(
                "retry.max_attempts must be at least 1",
            ));
        }
        if self.source.server_selection_timeout_ms == 0 || self.source.connect_timeout_ms == 0 {
            return Err(ExportError::config_invalid(
                "source timeouts must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Get server selection timeout as Duration
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.source.server_selection_timeout_ms)
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.source.connect_timeout_ms)
    }
}

impl RetryConfig {
    /// Get delay between attempts as Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
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

/// Raw run settings as provided by the environment
///
/// Nothing is validated at this stage; [`RunSettings::validate`] turns a
/// complete set into a [`RunContext`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    pub source_connection_string: Option<String>,
    pub source_database: Option<String>,
    pub source_collection: Option<String>,
    pub sink_connection_string: Option<String>,
    pub sink_container: Option<String>,
}

/// Validated, read-only configuration for one run
#[derive(Clone, PartialEq, Eq)]
pub struct RunContext {
    pub source_connection_string: String,
    pub source_database: String,
    pub source_collection: String,
    pub sink_connection_string: String,
    pub sink_container: String,
}

impl RunSettings {
    /// Read run settings from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read run settings through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            source_connection_string: lookup(ENV_SOURCE_CONNECTION_STRING),
            source_database: lookup(ENV_SOURCE_DATABASE),
            source_collection: lookup(ENV_SOURCE_COLLECTION),
            sink_connection_string: lookup(ENV_SINK_CONNECTION_STRING),
            sink_container: lookup(ENV_SINK_CONTAINER),
        }
    }

    /// Names of required settings that are absent or blank
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (ENV_SOURCE_CONNECTION_STRING, &self.source_connection_string),
            (ENV_SOURCE_DATABASE, &self.source_database),
            (ENV_SOURCE_COLLECTION, &self.source_collection),
            (ENV_SINK_CONNECTION_STRING, &self.sink_connection_string),
            (ENV_SINK_CONTAINER, &self.sink_container),
        ]
        .into_iter()
        .filter(|(_, value)| present(value).is_none())
        .map(|(name, _)| name)
        .collect()
    }

    /// Validate that every required setting is present and non-blank
    pub fn validate(&self) -> Result<RunContext> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(ExportError::config_missing(&missing));
        }

        let take = |value: &Option<String>| present(value).unwrap_or_default().to_string();
        Ok(RunContext {
            source_connection_string: take(&self.source_connection_string),
            source_database: take(&self.source_database),
            source_collection: take(&self.source_collection),
            sink_connection_string: take(&self.sink_connection_string),
            sink_container: take(&self.sink_container),
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn redact(value: &Option<String>) -> &'static str {
    if present(value).is_some() { "<set>" } else { "<missing>" }
}

impl fmt::Debug for RunSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSettings")
            .field("source_connection_string", &redact(&self.source_connection_string))
            .field("source_database", &self.source_database)
            .field("source_collection", &self.source_collection)
            .field("sink_connection_string", &redact(&self.sink_connection_string))
            .field("sink_container", &self.sink_container)
            .finish()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("source_connection_string", &"<redacted>")
            .field("source_database", &self.source_database)
            .field("source_collection", &self.source_collection)
            .field("sink_connection_string", &"<redacted>")
            .field("sink_container", &self.sink_container)
            .finish()
    }
}
