//! Trip store access.
//!
//! The store is reached through the repository traits in [`repository`], so
//! the HTTP server and the pipeline never depend on a particular backend.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP handlers / RepositoryFluxSource                   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//!   ClickHouse (HTTP)     Local (in-memory)
//! ```
//!
//! Backends are selected by [`RepositoryType`], from `REPOSITORY_TYPE` or a
//! `repository.toml` file (see [`RepositoryConfig`]).

#[cfg(not(any(feature = "clickhouse-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::RepositoryConfig;
#[cfg(feature = "clickhouse-repo")]
pub use repositories::{ClickHouseConfig, ClickHouseRepository};
pub use repositories::{LocalRepository, Trip};
pub use repository::{
    ErrorContext, FluxRecordStream, FluxRepository, FullRepository, RepositoryError,
    RepositoryResult, StationRepository,
};
