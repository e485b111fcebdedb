//! Station registry types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Geographic position of a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A row of the `current_stations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Short id used by trip records
    pub station_id: String,
    /// Id used by the live station feed
    pub current_station_id: String,
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

impl Station {
    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Lookup of stations by trip-record station id.
///
/// Built once from the store and shared read-only; flux records whose id is
/// missing here are dropped by the join.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: HashMap<String, Station>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, station: Station) {
        self.stations.insert(station.station_id.clone(), station);
    }

    pub fn get(&self, station_id: &str) -> Option<&Station> {
        self.stations.get(station_id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Stations sorted by id, for stable listings.
    pub fn sorted(&self) -> Vec<Station> {
        let mut stations: Vec<Station> = self.stations.values().cloned().collect();
        stations.sort_by(|a, b| a.station_id.cmp(&b.station_id));
        stations
    }
}

impl FromIterator<Station> for StationRegistry {
    fn from_iter<I: IntoIterator<Item = Station>>(iter: I) -> Self {
        let mut registry = Self::new();
        for station in iter {
            registry.insert(station);
        }
        registry
    }
}
