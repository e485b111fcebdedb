//! Station registry queries.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::Station;

/// Read access to the `current_stations` table.
#[async_trait]
pub trait StationRepository: Send + Sync {
    /// Fetch every known station.
    ///
    /// # Returns
    /// * `Ok(Vec<Station>)` - All stations, in no particular order
    /// * `Err(RepositoryError)` - If the store cannot be read
    async fn fetch_stations(&self) -> RepositoryResult<Vec<Station>>;
}
