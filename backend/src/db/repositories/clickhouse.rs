//! ClickHouse repository over the HTTP interface.
//!
//! Queries are POSTed as plain SQL with `JSONEachRow` output and the response
//! body is decoded line by line as it arrives, so the first stations reach the
//! caller before the query has finished. Dropping a flux stream drops the
//! in-flight HTTP response, which aborts the query server-side.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;

use crate::db::repository::{
    ErrorContext, FluxRecordStream, FluxRepository, RepositoryError, RepositoryResult,
    StationRepository,
};
use crate::models::{FluxRecord, Station};
use crate::services::predicate::FluxPredicates;
use crate::services::stream::decode_records;

use super::sql::{flux_sql, stations_sql};

/// Connection and query settings for ClickHouse.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickHouseConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Sent as the `max_threads` query setting
    pub max_threads: u32,
    /// Sent as the `max_memory_usage` query setting (e.g. `"8G"`)
    pub max_memory_usage: String,
    pub request_timeout_sec: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://clickhouse:8123".to_string(),
            database: "default".to_string(),
            user: "default".to_string(),
            password: String::new(),
            max_threads: 1,
            max_memory_usage: "8G".to_string(),
            request_timeout_sec: 120,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl ClickHouseConfig {
    /// Read `CLICKHOUSE_URL`, `CLICKHOUSE_DATABASE`, `CLICKHOUSE_USER` and
    /// `CLICKHOUSE_PASSWORD`, falling back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("CLICKHOUSE_URL") {
            config.url = url;
        }
        if let Ok(database) = env::var("CLICKHOUSE_DATABASE") {
            config.database = database;
        }
        if let Ok(user) = env::var("CLICKHOUSE_USER") {
            config.user = user;
        }
        if let Ok(password) = env::var("CLICKHOUSE_PASSWORD") {
            config.password = password;
        }
        config
    }

    fn query_settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("database", self.database.clone()),
            ("default_format", "JSONEachRow".to_string()),
            ("max_threads", self.max_threads.to_string()),
            ("max_memory_usage", self.max_memory_usage.clone()),
            // UInt64 sums as JSON numbers, not strings
            ("output_format_json_quote_64bit_integers", "0".to_string()),
        ]
    }
}

/// Repository backed by a ClickHouse server.
#[derive(Clone)]
pub struct ClickHouseRepository {
    client: reqwest::Client,
    config: Arc<ClickHouseConfig>,
}

impl ClickHouseRepository {
    pub fn new(config: ClickHouseConfig) -> RepositoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()
            .map_err(|e| {
                RepositoryError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        info!("ClickHouse repository at {} (database {})", config.url, config.database);
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    async fn send_once(&self, sql: &str) -> RepositoryResult<reqwest::Response> {
        let response = self
            .client
            .post(&self.config.url)
            .query(&self.config.query_settings())
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .body(sql.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<empty response>".to_string());
        let context = ErrorContext::default().with_details(format!("status={}", status));
        let context = if status.is_server_error() {
            context.retryable()
        } else {
            context
        };
        Err(RepositoryError::query_with_context(body.trim().to_string(), context))
    }

    /// Send a query, retrying retryable failures with exponential backoff.
    async fn send(&self, sql: &str, operation: &str) -> RepositoryResult<reqwest::Response> {
        let mut attempt = 0;
        loop {
            match self.send_once(sql).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(self.config.retry_delay_ms << attempt);
                    attempt += 1;
                    warn!(
                        "ClickHouse {} failed ({}); retry {}/{} in {:?}",
                        operation, e, attempt, self.config.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.with_operation(operation)),
            }
        }
    }

    async fn query_rows<T: DeserializeOwned>(
        &self,
        sql: &str,
        operation: &str,
    ) -> RepositoryResult<Vec<T>> {
        let response = self.send(sql, operation).await?;
        decode_records(response.bytes_stream().map_err(RepositoryError::from))
            .try_collect()
            .await
    }
}

#[async_trait]
impl StationRepository for ClickHouseRepository {
    async fn fetch_stations(&self) -> RepositoryResult<Vec<Station>> {
        self.query_rows(&stations_sql(), "fetch_stations").await
    }
}

#[async_trait]
impl FluxRepository for ClickHouseRepository {
    fn stream_flux(&self, predicates: &FluxPredicates) -> FluxRecordStream {
        let repo = self.clone();
        let sql = flux_sql(predicates);
        debug!("Flux query: {}", sql);

        async_stream::try_stream! {
            let response = repo.send(&sql, "stream_flux").await?;
            let records = decode_records::<FluxRecord, _, _>(
                response.bytes_stream().map_err(RepositoryError::from),
            );
            futures::pin_mut!(records);
            while let Some(record) = records.next().await {
                yield record?;
            }
        }
        .boxed()
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        let url = format!("{}/ping", self.config.url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }
}
