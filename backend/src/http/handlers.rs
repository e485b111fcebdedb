//! HTTP handlers for the REST API.
//!
//! `/flux` responses are streamed: one JSON record per line, written as the
//! store yields it. When the client disconnects, axum drops the body stream,
//! which drops the store query with it.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use log::{debug, warn};

use super::dto::{FluxRequestBody, HealthResponse, StationListResponse, WindowParams};
use super::error::AppError;
use super::state::AppState;
use crate::models::TemporalWindow;
use crate::services::flux::stream_flux;
use crate::services::stream::{encode_records, NDJSON_CONTENT_TYPE};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the store is reachable.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
        stations: state.stations.len(),
    }))
}

/// GET /ping
pub async fn ping() -> &'static str {
    "pong"
}

// =============================================================================
// Stations
// =============================================================================

/// GET /stations
///
/// Every station in the registry, sorted by id.
pub async fn list_stations(State(state): State<AppState>) -> HandlerResult<StationListResponse> {
    let stations = state.stations.sorted();
    let total = stations.len();
    Ok(Json(StationListResponse { stations, total }))
}

// =============================================================================
// Flux
// =============================================================================

/// GET /flux?startDate=YYYYMMDD&endDate=YYYYMMDD&startTime=HHMMSS&endTime=HHMMSS&daysOfWeek=1,2
///
/// Streams raw per-station counts as newline-delimited JSON.
pub async fn get_flux(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Response, AppError> {
    let window = params.parse()?;
    Ok(flux_response(&state, window))
}

/// POST /flux
///
/// Same as `GET /flux` with the window in a JSON body.
pub async fn post_flux(
    State(state): State<AppState>,
    body: Result<Json<FluxRequestBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    let window = body.to_window()?;
    Ok(flux_response(&state, window))
}

fn flux_response(state: &AppState, window: TemporalWindow) -> Response {
    debug!("Streaming flux for {:?}", window);

    let records = stream_flux(state.repository.as_ref(), &window)
        .inspect_err(|e| warn!("Flux stream aborted: {}", e));
    let body = Body::from_stream(encode_records(records));

    ([(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)], body).into_response()
}
