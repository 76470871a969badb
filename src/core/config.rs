//! Store configuration loaded from `bugreport.toml`.
//!
//! A missing file is not an error: every field has a default.

use crate::core::error::ReportError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "bugreport.toml";
pub const DEFAULT_PAGE_SIZE: usize = 27;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub notifications: NotificationConfig,
    pub listing: ListingConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bugreports.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub webhook_enabled: bool,
    pub webhook_url: String,
    pub dispatch_timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_enabled: false,
            webhook_url: String::new(),
            dispatch_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListingConfig {
    pub page_size: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// 0 disables the quota.
    pub max_reports_per_submitter: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_reports_per_submitter: 50,
        }
    }
}

impl StoreConfig {
    /// Config pointing at `db_path` with every other field defaulted.
    pub fn for_database(db_path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                path: db_path.into(),
                ..DatabaseConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.notifications.dispatch_timeout_ms)
    }

    pub fn webhook_active(&self) -> bool {
        self.notifications.webhook_enabled && !self.notifications.webhook_url.trim().is_empty()
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.listing.page_size == 0 {
            return Err(ReportError::ConfigError(
                "listing.page_size must be at least 1".to_string(),
            ));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(ReportError::ConfigError(
                "database.busy_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load config from `path`. Relative database paths resolve against the
/// config file's directory.
pub fn load_config(path: &Path) -> Result<StoreConfig, ReportError> {
    if !path.exists() {
        return Ok(StoreConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let mut config: StoreConfig =
        toml::from_str(&content).map_err(|e| ReportError::ConfigError(e.to_string()))?;

    if config.database.path.is_relative()
        && let Some(dir) = path.parent()
    {
        config.database.path = dir.join(&config.database.path);
    }

    config.validate()?;
    Ok(config)
}
