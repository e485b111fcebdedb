//! Data Transfer Objects for the HTTP API.

use serde::{Deserialize, Serialize};

pub use crate::models::{FluxRecord, Station, WindowParams};
use crate::models::{DaysOfWeek, TemporalWindow, WindowError};

/// JSON body accepted by `POST /flux`.
///
/// Same fields as the query string, with the weekday set as a list of
/// indices (`0` = Sunday). A missing list selects every day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxRequestBody {
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
}

impl FluxRequestBody {
    pub fn to_window(&self) -> Result<TemporalWindow, WindowError> {
        let window = TemporalWindow::from_wire(
            &self.start_date,
            &self.end_date,
            &self.start_time,
            &self.end_time,
            None,
        )?;
        match &self.days_of_week {
            Some(indices) => Ok(window.with_days(DaysOfWeek::from_indices(indices.iter().copied())?)),
            None => Ok(window),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Store connection status
    pub database: String,
    /// Stations in the registry
    pub stations: usize,
}

/// Station list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationListResponse {
    pub stations: Vec<Station>,
    pub total: usize,
}
