//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::models::StationRegistry;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Trip store
    pub repository: Arc<dyn FullRepository>,
    /// Station registry, loaded once at startup
    pub stations: Arc<StationRegistry>,
}

impl AppState {
    pub fn new(repository: Arc<dyn FullRepository>, stations: StationRegistry) -> Self {
        Self {
            repository,
            stations: Arc::new(stations),
        }
    }

    /// Load the station registry from `repository` and build the state.
    pub async fn load(
        repository: Arc<dyn FullRepository>,
    ) -> crate::db::RepositoryResult<Self> {
        let stations = crate::services::load_station_registry(repository.as_ref()).await?;
        Ok(Self::new(repository, stations))
    }
}
