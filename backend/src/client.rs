//! HTTP client for a running flux server.
//!
//! [`HttpFluxSource`] plugs a remote server into the
//! [`RequestCoordinator`](crate::services::RequestCoordinator): it requests
//! `/flux` for a window and decodes the NDJSON body incrementally, dropping the
//! connection as soon as the request is cancelled.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use log::debug;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::models::{FluxRecord, Station, StationRegistry, TemporalWindow, WindowParams};
use crate::services::coordinator::{FetchError, FluxSource};
use crate::services::stream::decode_stream;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_body() || err.is_request() {
            return FetchError::Transient(err.to_string());
        }
        match err.status() {
            Some(status) if is_transient_status(status) => FetchError::Transient(err.to_string()),
            _ => FetchError::Fatal(err.to_string()),
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Station list as returned by `GET /stations`.
#[derive(Debug, serde::Deserialize)]
struct StationList {
    stations: Vec<Station>,
}

/// Flux source reading from a flux server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFluxSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFluxSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Fatal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the station registry from `GET /stations`.
    pub async fn fetch_stations(&self) -> Result<StationRegistry, FetchError> {
        let list: StationList = self
            .client
            .get(format!("{}/stations", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.stations.into_iter().collect())
    }
}

#[async_trait]
impl FluxSource for HttpFluxSource {
    async fn fetch(
        &self,
        window: &TemporalWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<FluxRecord>, FetchError> {
        let params = WindowParams::from(window);
        let request = self
            .client
            .get(format!("{}/flux", self.base_url))
            .query(&params)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = request => response?.error_for_status()?,
        };

        let records: Vec<FluxRecord> =
            decode_stream(response.bytes_stream().map_err(FetchError::from), cancel).await?;
        debug!("Received {} flux records for {:?}", records.len(), window);
        Ok(records)
    }
}
