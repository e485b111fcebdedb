//! Flux aggregation glue between the store and the map.
//!
//! Server side, a window becomes a pair of predicates and a record stream
//! from the repository. Client side, raw records are joined with the station
//! registry and normalized into [`FluxPoint`]s.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::TryStreamExt;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::db::repository::{FluxRecordStream, FullRepository, RepositoryError, RepositoryResult};
use crate::models::{FluxPoint, FluxRecord, StationRegistry, TemporalWindow};
use crate::services::coordinator::{FetchError, FluxSource};
use crate::services::normalization::NormalizationFactor;
use crate::services::predicate::FluxPredicates;

/// Stream raw per-station counts for `window` straight from the store.
///
/// A window that can match nothing yields an empty stream without querying.
pub fn stream_flux(repo: &dyn FullRepository, window: &TemporalWindow) -> FluxRecordStream {
    let predicates = FluxPredicates::for_window(window);
    if predicates.is_unsatisfiable() {
        debug!("Window {:?} matches nothing; skipping query", window);
        return stream::empty().boxed();
    }
    repo.stream_flux(&predicates)
}

/// Join raw records with the registry and normalize them.
///
/// Records whose station is not in the registry are dropped with a warning.
/// A degenerate factor produces no points at all.
pub fn join_stations(
    records: Vec<FluxRecord>,
    registry: &StationRegistry,
    factor: &NormalizationFactor,
) -> Vec<FluxPoint> {
    if factor.is_degenerate() {
        return Vec::new();
    }

    let mut unknown = 0usize;
    let points: Vec<FluxPoint> = records
        .iter()
        .filter_map(|record| {
            let Some(station) = registry.get(&record.station_id) else {
                unknown += 1;
                warn!("Dropping flux for unknown station {}", record.station_id);
                return None;
            };
            let (inbound, outbound) = factor.normalize(record)?;
            Some(FluxPoint::new(station, inbound, outbound))
        })
        .collect();

    if unknown > 0 {
        debug!("{} of {} flux records had no station", unknown, records.len());
    }
    points
}

/// Build the station registry from the store.
pub async fn load_station_registry(repo: &dyn FullRepository) -> RepositoryResult<StationRegistry> {
    let stations = repo.fetch_stations().await?;
    let registry: StationRegistry = stations.into_iter().collect();
    info!("Loaded {} stations", registry.len());
    Ok(registry)
}

/// Store errors reach the coordinator after the repository's own retries, so
/// they are final there.
impl From<RepositoryError> for FetchError {
    fn from(err: RepositoryError) -> Self {
        FetchError::Fatal(err.to_string())
    }
}

/// [`FluxSource`] reading directly from a repository, without HTTP in between.
#[derive(Clone)]
pub struct RepositoryFluxSource {
    repo: Arc<dyn FullRepository>,
}

impl RepositoryFluxSource {
    pub fn new(repo: Arc<dyn FullRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl FluxSource for RepositoryFluxSource {
    async fn fetch(
        &self,
        window: &TemporalWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<FluxRecord>, FetchError> {
        let records = stream_flux(self.repo.as_ref(), window).map_err(FetchError::from);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = records.try_collect::<Vec<_>>() => result,
        }
    }
}
