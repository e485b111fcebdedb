//! In-memory repository for tests and local development.
//!
//! Holds stations and trips behind `parking_lot` locks and evaluates the flux
//! predicates in Rust, mirroring what the ClickHouse query computes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use log::info;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::db::repository::{
    ErrorContext, FluxRecordStream, FluxRepository, RepositoryError, RepositoryResult,
    StationRepository,
};
use crate::models::{FluxRecord, Station};
use crate::services::predicate::FluxPredicates;

/// One trip, or `count` identical trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub start_station_id: String,
    pub end_station_id: String,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    #[serde(default = "default_trip_count")]
    pub count: u64,
}

fn default_trip_count() -> u64 {
    1
}

impl Trip {
    pub fn new(
        start_station_id: impl Into<String>,
        end_station_id: impl Into<String>,
        started_at: NaiveDateTime,
        ended_at: NaiveDateTime,
    ) -> Self {
        Self {
            start_station_id: start_station_id.into(),
            end_station_id: end_station_id.into(),
            started_at,
            ended_at,
            count: 1,
        }
    }

    pub fn times(mut self, count: u64) -> Self {
        self.count = count;
        self
    }
}

/// Fixture file layout: `{ "stations": [...], "trips": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalFixture {
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(default)]
    pub trips: Vec<Trip>,
}

/// In-memory implementation of the repository traits.
#[derive(Debug, Default)]
pub struct LocalRepository {
    stations: RwLock<Vec<Station>>,
    trips: RwLock<Vec<Trip>>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(stations: Vec<Station>, trips: Vec<Trip>) -> Self {
        Self {
            stations: RwLock::new(stations),
            trips: RwLock::new(trips),
        }
    }

    /// Load stations and trips from a JSON fixture file.
    pub fn from_fixture<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RepositoryError::configuration_with_context(
                format!("Failed to read fixture: {}", e),
                ErrorContext::new("load_fixture").with_entity_id(path.display()),
            )
        })?;
        let fixture: LocalFixture = serde_json::from_str(&content)
            .map_err(|e| RepositoryError::from(e).with_operation("load_fixture"))?;

        info!(
            "Loaded fixture {} ({} stations, {} trips)",
            path.display(),
            fixture.stations.len(),
            fixture.trips.len()
        );
        Ok(Self::with_data(fixture.stations, fixture.trips))
    }

    pub fn insert_station(&self, station: Station) {
        self.stations.write().push(station);
    }

    pub fn insert_trips(&self, trips: impl IntoIterator<Item = Trip>) {
        self.trips.write().extend(trips);
    }

    pub fn trip_count(&self) -> usize {
        self.trips.read().len()
    }

    /// Aggregate matching trips per station, sorted by station id.
    pub fn aggregate(&self, predicates: &FluxPredicates) -> Vec<FluxRecord> {
        let trips = self.trips.read();
        let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();

        for trip in trips.iter() {
            if predicates.started_at.matches(trip.started_at) {
                totals.entry(trip.start_station_id.as_str()).or_default().1 += trip.count;
            }
            if predicates.ended_at.matches(trip.ended_at) {
                totals.entry(trip.end_station_id.as_str()).or_default().0 += trip.count;
            }
        }

        totals
            .into_iter()
            .map(|(id, (inbound, outbound))| FluxRecord::new(id, inbound, outbound))
            .collect()
    }
}

#[async_trait]
impl StationRepository for LocalRepository {
    async fn fetch_stations(&self) -> RepositoryResult<Vec<Station>> {
        Ok(self.stations.read().clone())
    }
}

#[async_trait]
impl FluxRepository for LocalRepository {
    fn stream_flux(&self, predicates: &FluxPredicates) -> FluxRecordStream {
        let records = self.aggregate(predicates);
        stream::iter(records.into_iter().map(Ok)).boxed()
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}
