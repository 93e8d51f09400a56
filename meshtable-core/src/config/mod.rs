//! Configuration management for meshtable
//!
//! A TOML file (or defaults) overlaid with `MESHTABLE_*` environment
//! variables, then validated as a whole.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::core_table::TableConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Table limits and retention
    pub table: TableConfig,

    /// Snapshot persistence
    pub persistence: PersistenceConfig,

    /// Reconciliation pacing
    pub sync: SyncConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Write snapshots at all; when off the table lives in memory only
    pub enabled: bool,

    /// Snapshot file location
    pub snapshot_path: PathBuf,
}

/// Reconciliation pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How often a namespace asks its members for their records
    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,

    /// How often one pending record is fetched
    #[serde(with = "humantime_serde")]
    pub fetch_interval: Duration,

    /// How often tombstones past retention are pruned
    #[serde(with = "humantime_serde")]
    pub prune_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { enabled: true, snapshot_path: PathBuf::from("./data/meshtable.snapshot") }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(60),
            fetch_interval: Duration::from_millis(100),
            prune_interval: Duration::from_secs(3600),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

fn parse_duration_var(name: &str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(raw) => humantime_serde::re::humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// File if given, otherwise defaults; environment applied on top either way
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply overrides of the form MESHTABLE_<SECTION>_<KEY>
    ///
    /// Example: MESHTABLE_TABLE_MAX_RECORDS=1024
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(max) = parse_var("MESHTABLE_TABLE_MAX_NAMESPACES")? {
            self.table.max_namespaces = max;
        }
        if let Some(max) = parse_var("MESHTABLE_TABLE_MAX_RECORDS")? {
            self.table.max_records = max;
        }
        if let Some(retention) = parse_duration_var("MESHTABLE_TABLE_TOMBSTONE_RETENTION")? {
            self.table.tombstone_retention = retention;
        }

        if let Some(enabled) = parse_var("MESHTABLE_PERSISTENCE_ENABLED")? {
            self.persistence.enabled = enabled;
        }
        if let Ok(path) = env::var("MESHTABLE_PERSISTENCE_SNAPSHOT_PATH") {
            self.persistence.snapshot_path = PathBuf::from(path);
        }

        if let Some(interval) = parse_duration_var("MESHTABLE_SYNC_INTERVAL")? {
            self.sync.sync_interval = interval;
        }
        if let Some(interval) = parse_duration_var("MESHTABLE_SYNC_FETCH_INTERVAL")? {
            self.sync.fetch_interval = interval;
        }
        if let Some(interval) = parse_duration_var("MESHTABLE_SYNC_PRUNE_INTERVAL")? {
            self.sync.prune_interval = interval;
        }

        if let Ok(level) = env::var("MESHTABLE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_var("MESHTABLE_LOG_JSON")? {
            self.logging.json_format = json;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.table.validate().map_err(ConfigError::ValidationFailed)?;

        if self.persistence.enabled && self.persistence.snapshot_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "persistence enabled but snapshot_path is empty".to_string(),
            ));
        }

        if self.sync.sync_interval.is_zero()
            || self.sync.fetch_interval.is_zero()
            || self.sync.prune_interval.is_zero()
        {
            return Err(ConfigError::ValidationFailed(
                "sync intervals must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}
