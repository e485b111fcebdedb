//! Repository factory for dependency injection.
//!
//! This module provides utilities for creating and configuring repository instances
//! based on runtime configuration.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::repo_config::RepositoryConfig;
#[cfg(feature = "clickhouse-repo")]
use super::repositories::{ClickHouseConfig, ClickHouseRepository};
use super::repositories::LocalRepository;
use super::repository::{FullRepository, RepositoryError, RepositoryResult};

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// ClickHouse over HTTP
    ClickHouse,
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Parse repository type from string ("clickhouse", "ch", "local").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clickhouse" | "ch" => Ok(Self::ClickHouse),
            "local" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl RepositoryType {
    /// Get repository type from environment variable.
    ///
    /// Reads `REPOSITORY_TYPE`. Without it, ClickHouse is chosen when
    /// `CLICKHOUSE_URL` is set, otherwise Local.
    pub fn from_env() -> Self {
        if let Ok(val) = std::env::var("REPOSITORY_TYPE") {
            return val.parse().unwrap_or(Self::Local);
        }

        if std::env::var("CLICKHOUSE_URL").is_ok() {
            Self::ClickHouse
        } else {
            Self::Local
        }
    }
}

/// Repository factory for creating repository instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a ClickHouse repository.
    #[cfg(feature = "clickhouse-repo")]
    pub fn create_clickhouse(config: ClickHouseConfig) -> RepositoryResult<Arc<dyn FullRepository>> {
        Ok(Arc::new(ClickHouseRepository::new(config)?))
    }

    /// Create an empty in-memory local repository.
    pub fn create_local() -> Arc<dyn FullRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create a local repository seeded from a JSON fixture, or empty without one.
    pub fn create_local_from(fixture: Option<&Path>) -> RepositoryResult<Arc<dyn FullRepository>> {
        match fixture {
            Some(path) => Ok(Arc::new(LocalRepository::from_fixture(path)?)),
            None => Ok(Self::create_local()),
        }
    }

    /// Create repository from environment configuration.
    pub fn from_env() -> RepositoryResult<Arc<dyn FullRepository>> {
        match RepositoryType::from_env() {
            RepositoryType::ClickHouse => {
                #[cfg(feature = "clickhouse-repo")]
                {
                    Self::create_clickhouse(ClickHouseConfig::from_env())
                }
                #[cfg(not(feature = "clickhouse-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "ClickHouse repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => Ok(Self::create_local()),
        }
    }

    /// Create repository from a TOML configuration file.
    pub fn from_config_file<P: AsRef<Path>>(
        config_path: P,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        let config = RepositoryConfig::from_file(config_path)?;
        Self::from_repository_config(&config)
    }

    /// Create repository from the default configuration file location.
    pub fn from_default_config() -> RepositoryResult<Arc<dyn FullRepository>> {
        let config = RepositoryConfig::from_default_location()?;
        Self::from_repository_config(&config)
    }

    /// Create repository from a RepositoryConfig instance.
    pub fn from_repository_config(
        config: &RepositoryConfig,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        let repo_type = config.repository_type().map_err(|e| {
            RepositoryError::configuration(format!("Invalid repository type: {}", e))
        })?;

        match repo_type {
            RepositoryType::ClickHouse => {
                #[cfg(feature = "clickhouse-repo")]
                {
                    Self::create_clickhouse(config.to_clickhouse_config())
                }
                #[cfg(not(feature = "clickhouse-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "ClickHouse repository feature not enabled",
                    ))
                }
            }
            RepositoryType::Local => Self::create_local_from(config.local.fixture.as_deref()),
        }
    }
}
