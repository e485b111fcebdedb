//! Repository configuration file support.
//!
//! Reads which store to use, and how to reach it, from a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::factory::RepositoryType;
use super::repository::RepositoryError;
#[cfg(feature = "clickhouse-repo")]
use super::repositories::ClickHouseConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "FLUX_CONFIG";

/// Repository configuration from file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub repository: RepositorySettings,
    #[serde(default)]
    pub clickhouse: ClickHouseSettings,
    #[serde(default)]
    pub local: LocalSettings,
}

/// Repository type settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(rename = "type")]
    pub repo_type: String,
}

/// ClickHouse connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseSettings {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_threads")]
    pub max_threads: u32,
    #[serde(default = "default_max_memory_usage")]
    pub max_memory_usage: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ClickHouseSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            database: default_database(),
            user: default_user(),
            password: String::new(),
            max_threads: default_max_threads(),
            max_memory_usage: default_max_memory_usage(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Local store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalSettings {
    /// JSON fixture with stations and trips; empty store when absent
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

fn default_url() -> String {
    "http://clickhouse:8123".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

fn default_user() -> String {
    "default".to_string()
}

fn default_max_threads() -> u32 {
    1
}

fn default_max_memory_usage() -> String {
    "8G".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

impl RepositoryConfig {
    /// Load repository configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(RepositoryConfig)` if successful
    /// * `Err(RepositoryError)` if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RepositoryError::configuration(format!("Failed to read config file: {}", e))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, RepositoryError> {
        toml::from_str(content).map_err(|e| {
            RepositoryError::configuration(format!("Failed to parse config file: {}", e))
        })
    }

    /// Load repository configuration from the default location.
    ///
    /// Uses `FLUX_CONFIG` when set, otherwise searches for `repository.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self, RepositoryError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::from_file(path);
        }

        let search_paths = [
            PathBuf::from("repository.toml"),
            PathBuf::from("backend/repository.toml"),
            PathBuf::from("../repository.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(RepositoryError::configuration(
            "No repository.toml found in standard locations",
        ))
    }

    /// Get the repository type from configuration.
    pub fn repository_type(&self) -> Result<RepositoryType, String> {
        RepositoryType::from_str(&self.repository.repo_type)
    }

    #[cfg(feature = "clickhouse-repo")]
    pub fn to_clickhouse_config(&self) -> ClickHouseConfig {
        let s = &self.clickhouse;
        ClickHouseConfig {
            url: s.url.clone(),
            database: s.database.clone(),
            user: s.user.clone(),
            password: s.password.clone(),
            max_threads: s.max_threads,
            max_memory_usage: s.max_memory_usage.clone(),
            request_timeout_sec: s.request_timeout,
            max_retries: s.max_retries,
            retry_delay_ms: s.retry_delay_ms,
        }
    }
}
