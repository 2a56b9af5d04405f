//! Baton Configuration
//!
//! Handles parsing and management of baton.toml configuration files.

use crate::pool::{DEFAULT_WORKERS, MAX_WORKERS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Config file name searched for by [`BatonConfig::find_and_load`]
pub const CONFIG_FILE: &str = "baton.toml";

/// Environment variable overriding the worker count
pub const THREADPOOL_SIZE_ENV: &str = "BATON_THREADPOOL_SIZE";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("pool.workers must be between 1 and {max}, got {got}")]
    InvalidWorkers { got: usize, max: usize },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigFileError>;

/// Root configuration structure matching baton.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BatonConfig {
    /// Worker pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BatonConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigFileError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: BatonConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigFileError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.workers == 0 || self.pool.workers > MAX_WORKERS {
            return Err(ConfigFileError::InvalidWorkers {
                got: self.pool.workers,
                max: MAX_WORKERS,
            });
        }
        Ok(())
    }

    /// Apply `BATON_THREADPOOL_SIZE` on top of the file settings.
    pub fn apply_env(&mut self) {
        self.pool.apply_env();
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Worker thread name prefix
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_thread_name() -> String {
    "baton-worker".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            thread_name: default_thread_name(),
        }
    }
}

impl PoolConfig {
    /// Defaults with `BATON_THREADPOOL_SIZE` applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override `workers` from `BATON_THREADPOOL_SIZE` when it is set
    pub fn apply_env(&mut self) {
        if let Some(workers) = workers_from_env(std::env::var(THREADPOOL_SIZE_ENV).ok().as_deref())
        {
            self.workers = workers;
        }
    }
}

/// Interpret a `BATON_THREADPOOL_SIZE` value.
///
/// Unparseable values are ignored; parsed values are clamped to
/// `1..=MAX_WORKERS`.
pub fn workers_from_env(value: Option<&str>) -> Option<usize> {
    let parsed: i64 = value?.trim().parse().ok()?;
    Some(parsed.clamp(1, MAX_WORKERS as i64) as usize)
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "baton=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}
