//! Flux HTTP Server Binary
//!
//! Loads the station registry, sets up the HTTP router, and starts serving requests.
//!
//! # Usage
//!
//! ```bash
//! # Run with local (in-memory) repository (default)
//! cargo run --bin flux-server
//!
//! # Run against ClickHouse
//! REPOSITORY_TYPE=clickhouse CLICKHOUSE_URL=http://localhost:8123 \
//!   cargo run --bin flux-server --features clickhouse-repo
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 3001)
//! - `FLUX_CONFIG`: Path to a repository TOML file
//! - `REPOSITORY_TYPE`: `local` or `clickhouse`, used when no config file is found
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flux_map::db::{RepositoryConfig, RepositoryFactory};
use flux_map::http::{create_router, AppState};

const DEFAULT_PORT: u16 = 3001;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting flux server");

    let repository = match RepositoryConfig::from_default_location() {
        Ok(config) => RepositoryFactory::from_repository_config(&config)?,
        Err(e) => {
            warn!("{}; falling back to environment", e);
            RepositoryFactory::from_env()?
        }
    };

    let state = AppState::load(repository).await?;
    info!("Station registry loaded ({} stations)", state.stations.len());

    let app = create_router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
