//! Repository implementations.
//!
//! - `local`: in-memory store for tests and local development
//! - `clickhouse`: ClickHouse over HTTP
//! - `sql`: the query text the ClickHouse store runs
#[cfg(feature = "clickhouse-repo")]
pub mod clickhouse;
pub mod local;
pub mod sql;

#[cfg(feature = "clickhouse-repo")]
pub use clickhouse::{ClickHouseConfig, ClickHouseRepository};
pub use local::{LocalFixture, LocalRepository, Trip};
