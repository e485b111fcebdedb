//! The ClickHouse repository against a stand-in HTTP server on a loopback port.

#![cfg(all(feature = "clickhouse-repo", feature = "http-server"))]

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use futures::TryStreamExt;

use flux_map::db::repositories::{ClickHouseConfig, ClickHouseRepository};
use flux_map::db::repository::FluxRepository;
use flux_map::models::FluxRecord;
use flux_map::services::predicate::FluxPredicates;
use flux_map::services::{
    CoordinatorConfig, FetchError, RepositoryFluxSource, RequestCoordinator,
};

const ROWS: &str = "{\"stationId\":\"A\",\"inbound\":30,\"outbound\":60}\n\
                    {\"stationId\":\"B\",\"inbound\":60,\"outbound\":30}\n";

#[derive(Clone)]
struct Store {
    hits: Arc<AtomicUsize>,
    failures: usize,
}

async fn query(State(store): State<Store>) -> (StatusCode, &'static str) {
    let hit = store.hits.fetch_add(1, Ordering::SeqCst);
    if hit < store.failures {
        (StatusCode::SERVICE_UNAVAILABLE, "Code: 241. Memory limit exceeded")
    } else {
        (StatusCode::OK, ROWS)
    }
}

async fn serve(failures: usize) -> (ClickHouseRepository, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/", post(query)).with_state(Store {
        hits: hits.clone(),
        failures,
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let repo = ClickHouseRepository::new(ClickHouseConfig {
        url: format!("http://{}/", addr),
        retry_delay_ms: 1,
        ..ClickHouseConfig::default()
    })
    .unwrap();
    (repo, hits)
}

#[tokio::test]
async fn test_server_errors_are_retried_by_the_store() {
    let (repo, hits) = serve(2).await;
    let predicates = FluxPredicates::for_window(&support::first_week_commute());
    let records: Vec<FluxRecord> = repo.stream_flux(&predicates).try_collect().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_happen_in_one_layer() {
    let (repo, hits) = serve(usize::MAX).await;
    let coordinator = RequestCoordinator::new(
        Arc::new(RepositoryFluxSource::new(Arc::new(repo))),
        Arc::new(Default::default()),
        CoordinatorConfig::default(),
    );

    let err = coordinator
        .request(support::first_week_commute())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Fatal(_)));
    // One attempt plus the store's three retries
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}
