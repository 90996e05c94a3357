//! Store configuration loaded from JSON.
//!
//! # Invariants
//! - Missing keys fall back to defaults; unknown keys are rejected.
//! - No `database_path` means an in-memory database.

use crate::logging::{default_log_level, init_logging};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid store config: {err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Logging(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: default_level(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Starts file logging when `log_dir` is set; otherwise does nothing.
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        match &self.log_dir {
            Some(dir) => init_logging(&self.log_level, dir).map_err(ConfigError::Logging),
            None => Ok(()),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_level() -> String {
    default_log_level().to_string()
}
