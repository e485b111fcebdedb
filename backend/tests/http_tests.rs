//! HTTP API tests, driven through the router without binding a socket.

#![cfg(feature = "http-server")]

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use flux_map::db::repository::FullRepository;
use flux_map::http::dto::{HealthResponse, StationListResponse};
use flux_map::http::error::ApiError;
use flux_map::http::{create_router, AppState};
use flux_map::models::FluxRecord;
use flux_map::services::stream::LineDecoder;

async fn app() -> Router {
    let repo: Arc<dyn FullRepository> = Arc::new(support::commute_repository());
    let state = AppState::load(repo).await.unwrap();
    create_router(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

async fn get(uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app().await, request).await
}

fn decode_flux(body: &[u8]) -> HashMap<String, (u64, u64)> {
    let mut decoder = LineDecoder::<FluxRecord>::new();
    let records = decoder.push(body);
    assert_eq!(decoder.rejected(), 0);
    assert_eq!(decoder.finish(), 0);
    records
        .into_iter()
        .map(|r| (r.station_id, (r.inbound, r.outbound)))
        .collect()
}

#[tokio::test]
async fn test_ping() {
    let (status, _, body) = get("/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pong");
}

#[tokio::test]
async fn test_health_reports_station_count() {
    let (status, _, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.database, "connected");
    assert_eq!(health.stations, 3);
}

#[tokio::test]
async fn test_list_stations_sorted() {
    let (status, _, body) = get("/stations").await;
    assert_eq!(status, StatusCode::OK);

    let list: StationListResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.total, 3);
    let ids: Vec<&str> = list.stations.iter().map(|s| s.station_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_get_flux_streams_ndjson() {
    let (status, content_type, body) = get(
        "/flux?startDate=20240101&endDate=20240107&startTime=060000&endTime=100000&daysOfWeek=1,2,3,4,5",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/x-ndjson"));
    assert!(body.ends_with(b"\n"));

    // Raw counts; unknown stations are the client's to drop
    let records = decode_flux(&body);
    assert_eq!(records.len(), 3);
    assert_eq!(records["A"], (30, 60));
    assert_eq!(records["B"], (60, 30));
    assert_eq!(records["Z"], (4, 4));
    assert!(!records.contains_key("C"));
}

#[tokio::test]
async fn test_get_flux_without_days_selects_every_day() {
    let (status, _, body) =
        get("/flux?startDate=20240101&endDate=20240107&startTime=060000&endTime=100000").await;

    assert_eq!(status, StatusCode::OK);
    let records = decode_flux(&body);
    // The Saturday A -> C trips now count
    assert_eq!(records["A"], (30, 69));
    assert_eq!(records["C"], (9, 0));
}

#[tokio::test]
async fn test_get_flux_with_empty_days_is_empty() {
    let (status, _, body) = get(
        "/flux?startDate=20240101&endDate=20240107&startTime=060000&endTime=100000&daysOfWeek=",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_get_flux_wrapping_window() {
    let (status, _, body) =
        get("/flux?startDate=20240101&endDate=20240107&startTime=220000&endTime=020000").await;

    assert_eq!(status, StatusCode::OK);
    assert!(decode_flux(&body).is_empty());
}

#[tokio::test]
async fn test_post_flux_matches_get() {
    let request = Request::builder()
        .method("POST")
        .uri("/flux")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "startDate": "20240101",
                "endDate": "20240107",
                "startTime": "060000",
                "endTime": "100000",
                "daysOfWeek": [5, 4, 3, 2, 1],
            })
            .to_string(),
        ))
        .unwrap();

    let (status, _, body) = send(app().await, request).await;
    assert_eq!(status, StatusCode::OK);

    let records = decode_flux(&body);
    assert_eq!(records["A"], (30, 60));
    assert_eq!(records["B"], (60, 30));
}

#[tokio::test]
async fn test_post_flux_with_malformed_body_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/flux")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"startDate\": 20240101"))
        .unwrap();

    let (status, _, body) = send(app().await, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ApiError = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.code, "BAD_REQUEST");
    assert!(error.details.is_some());
}

#[tokio::test]
async fn test_missing_parameter_is_bad_request() {
    let (status, _, body) =
        get("/flux?startDate=20240101&endDate=20240107&startTime=060000").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ApiError = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.code, "BAD_REQUEST");
    assert!(error.message.contains("endTime"));
}

#[tokio::test]
async fn test_malformed_date_is_bad_request() {
    let (status, _, _) =
        get("/flux?startDate=2024-01-01&endDate=20240107&startTime=060000&endTime=100000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reversed_dates_are_bad_request() {
    let (status, _, _) =
        get("/flux?startDate=20240107&endDate=20240101&startTime=060000&endTime=100000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_weekday_is_bad_request() {
    let (status, _, _) = get(
        "/flux?startDate=20240101&endDate=20240107&startTime=060000&endTime=100000&daysOfWeek=7",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, _, _) = get("/trips").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
