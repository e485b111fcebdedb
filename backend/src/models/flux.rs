//! Per-station flux types.

use serde::{Deserialize, Serialize};

use super::station::{Location, Station};

/// Raw aggregate output for one station.
///
/// `inbound` counts trips ending at the station that match the `ended_at`
/// predicate; `outbound` counts trips starting there that match the
/// `started_at` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxRecord {
    pub station_id: String,
    pub inbound: u64,
    pub outbound: u64,
}

impl FluxRecord {
    pub fn new(station_id: impl Into<String>, inbound: u64, outbound: u64) -> Self {
        Self {
            station_id: station_id.into(),
            inbound,
            outbound,
        }
    }
}

/// Normalized flux for one station, joined with its registry entry.
///
/// `flux` and `rides` are always derived from the normalized `inbound` and
/// `outbound`, never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxPoint {
    pub station_id: String,
    pub current_station_id: String,
    pub station_name: String,
    pub location: Location,
    pub inbound: f64,
    pub outbound: f64,
    pub flux: f64,
    pub rides: f64,
}

impl FluxPoint {
    pub fn new(station: &Station, inbound: f64, outbound: f64) -> Self {
        Self {
            station_id: station.station_id.clone(),
            current_station_id: station.current_station_id.clone(),
            station_name: station.station_name.clone(),
            location: station.location(),
            inbound,
            outbound,
            flux: inbound - outbound,
            rides: inbound + outbound,
        }
    }

    /// GeoJSON `Feature` with a `Point` geometry in `[lon, lat]` order.
    pub fn to_feature(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [self.location.longitude, self.location.latitude],
            },
            "properties": {
                "stationId": self.station_id,
                "currentStationId": self.current_station_id,
                "stationName": self.station_name,
                "inbound": self.inbound,
                "outbound": self.outbound,
                "flux": self.flux,
                "rides": self.rides,
            },
        })
    }
}

/// GeoJSON `FeatureCollection` of flux points, the shape map layers consume.
pub fn to_feature_collection(points: &[FluxPoint]) -> serde_json::Value {
    serde_json::json!({
        "type": "FeatureCollection",
        "features": points.iter().map(FluxPoint::to_feature).collect::<Vec<_>>(),
    })
}
