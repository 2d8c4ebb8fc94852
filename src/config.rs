//! Configuration loaded from a TOML file
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StoreError;
use crate::store::SledStore;
use crate::temporal::SystemClock;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the sled database
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Use a throwaway database, deleted on exit
    #[serde(default)]
    pub temporary: bool,
}

/// Zone used to decide which day "today" is for effective dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Offset from UTC in minutes; the server's local zone when absent
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/ach-files")
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            temporary: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl AchConfig {
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config: AchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.temporary && self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage.path is empty and storage.temporary is off".to_string(),
            ));
        }
        self.utc_offset()?;
        Ok(())
    }

    fn utc_offset(&self) -> Result<Option<FixedOffset>, ConfigError> {
        match self.clock.utc_offset_minutes {
            None => Ok(None),
            Some(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(Some)
                .ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "clock.utc_offset_minutes {minutes} is outside ±24h"
                    ))
                }),
        }
    }

    pub fn clock(&self) -> Result<SystemClock, ConfigError> {
        Ok(match self.utc_offset()? {
            Some(offset) => SystemClock::with_offset(offset),
            None => SystemClock::new(),
        })
    }

    pub fn open_store(&self) -> Result<SledStore, StoreError> {
        if self.storage.temporary {
            SledStore::temporary()
        } else {
            SledStore::open(&self.storage.path)
        }
    }
}
