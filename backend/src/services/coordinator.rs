//! Request coordination for flux queries.
//!
//! Every selection of a [`TemporalWindow`] goes through
//! [`RequestCoordinator::request`]. The coordinator guarantees that:
//!
//! - a newer selection with a different window cancels the in-flight fetch,
//!   and a superseded fetch never reaches the published result;
//! - concurrent selections of the same window share one fetch;
//! - completed results are served from a short-lived cache;
//! - transient failures are retried a bounded number of times, cancellation
//!   never is.
//!
//! The published result is a single `Arc<FluxResult>` behind a
//! [`tokio::sync::watch`] channel, replaced whole on delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::{FluxPoint, FluxRecord, StationRegistry, TemporalWindow};
use crate::services::flux::join_stations;
use crate::services::normalization::NormalizationFactor;

/// Failure of a flux fetch, as seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The fetch was superseded or explicitly cancelled. Not a failure.
    #[error("request cancelled")]
    Cancelled,

    /// Network or store hiccup; worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Will fail again if retried.
    #[error("request failed: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Where raw flux records come from: a remote server, or the store directly.
#[async_trait]
pub trait FluxSource: Send + Sync {
    /// Fetch every station's raw counts for `window`.
    ///
    /// Implementations should observe `cancel` and return
    /// [`FetchError::Cancelled`] promptly once it fires.
    async fn fetch(
        &self,
        window: &TemporalWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<FluxRecord>, FetchError>;
}

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a completed result may be reused for the same window
    pub cache_ttl: Duration,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Delay before the first retry (doubles with each retry)
    pub retry_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Normalized result for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxResult {
    pub window: TemporalWindow,
    pub factor: NormalizationFactor,
    pub points: Vec<FluxPoint>,
}

impl FluxResult {
    /// Join raw records with the registry and normalize them for `window`.
    pub fn build(window: TemporalWindow, records: Vec<FluxRecord>, registry: &StationRegistry) -> Self {
        let factor = NormalizationFactor::for_window(&window);
        let points = join_stations(records, registry, &factor);
        Self {
            window,
            factor,
            points,
        }
    }

    /// Nothing to render.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// What a single [`RequestCoordinator::request`] call ended with.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// This selection's result is now the published one.
    Delivered(Arc<FluxResult>),
    /// A newer selection replaced this one before it completed.
    Superseded,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<FluxResult>, FetchError>>>;

struct InFlight {
    id: u64,
    window: TemporalWindow,
    cancel: CancellationToken,
    fetch: SharedFetch,
}

struct CacheEntry {
    stored_at: Instant,
    result: Arc<FluxResult>,
}

#[derive(Default)]
struct CoordinatorState {
    /// Bumped on every selection; only the latest may report `Delivered`.
    generation: u64,
    next_fetch_id: u64,
    in_flight: Option<InFlight>,
    cache: HashMap<TemporalWindow, CacheEntry>,
}

/// Cancels, de-duplicates, caches and retries flux requests.
#[derive(Clone)]
pub struct RequestCoordinator {
    source: Arc<dyn FluxSource>,
    registry: Arc<StationRegistry>,
    config: CoordinatorConfig,
    state: Arc<Mutex<CoordinatorState>>,
    current: Arc<watch::Sender<Option<Arc<FluxResult>>>>,
}

impl RequestCoordinator {
    pub fn new(
        source: Arc<dyn FluxSource>,
        registry: Arc<StationRegistry>,
        config: CoordinatorConfig,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            source,
            registry,
            config,
            state: Arc::new(Mutex::new(CoordinatorState::default())),
            current: Arc::new(current),
        }
    }

    /// Receiver for the published result of the active window.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<FluxResult>>> {
        self.current.subscribe()
    }

    /// The currently published result, if any.
    pub fn current(&self) -> Option<Arc<FluxResult>> {
        self.current.borrow().clone()
    }

    /// Select `window` and wait for its result.
    pub async fn request(&self, window: TemporalWindow) -> Result<Outcome, FetchError> {
        let (generation, fetch) = {
            let mut state = self.state.lock();
            state.generation += 1;
            let generation = state.generation;

            if let Some(result) = self.cached(&mut state, &window) {
                debug!("Serving flux for {:?} from cache", window);
                if let Some(previous) = state.in_flight.take() {
                    previous.cancel.cancel();
                }
                self.publish(result.clone());
                return Ok(Outcome::Delivered(result));
            }

            let fetch = match &state.in_flight {
                Some(in_flight) if in_flight.window == window => {
                    debug!("Joining in-flight flux request for {:?}", window);
                    in_flight.fetch.clone()
                }
                _ => self.start_fetch(&mut state, window),
            };
            (generation, fetch)
        };

        let result = fetch.await;

        let state = self.state.lock();
        if state.generation != generation {
            debug!("Flux request for {:?} superseded", window);
            return Ok(Outcome::Superseded);
        }
        result.map(Outcome::Delivered)
    }

    /// Cancel whatever is in flight without selecting anything new.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.cancel.cancel();
        }
    }

    fn cached(&self, state: &mut CoordinatorState, window: &TemporalWindow) -> Option<Arc<FluxResult>> {
        let ttl = self.config.cache_ttl;
        state.cache.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        state.cache.get(window).map(|entry| entry.result.clone())
    }

    fn publish(&self, result: Arc<FluxResult>) {
        self.current.send_replace(Some(result));
    }

    fn start_fetch(&self, state: &mut CoordinatorState, window: TemporalWindow) -> SharedFetch {
        if let Some(previous) = state.in_flight.take() {
            debug!("Cancelling flux request for {:?}", previous.window);
            previous.cancel.cancel();
        }

        state.next_fetch_id += 1;
        let id = state.next_fetch_id;
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_fetch(
            self.clone(),
            id,
            window,
            cancel.clone(),
        ));
        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(FetchError::Fatal(format!("fetch task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            id,
            window,
            cancel,
            fetch: fetch.clone(),
        });
        fetch
    }

    /// Publish a finished fetch unless it was superseded meanwhile.
    fn complete(&self, id: u64, window: TemporalWindow, cancel: &CancellationToken, result: &Arc<FluxResult>) {
        let mut state = self.state.lock();
        if cancel.is_cancelled() {
            debug!("Discarding superseded flux result for {:?}", window);
            return;
        }
        if state.in_flight.as_ref().map(|f| f.id) == Some(id) {
            state.in_flight = None;
        }
        state.cache.insert(
            window,
            CacheEntry {
                stored_at: Instant::now(),
                result: result.clone(),
            },
        );
        self.publish(result.clone());
    }

    /// Forget a failed fetch so the next request for its window starts over.
    fn abandon(&self, id: u64) {
        let mut state = self.state.lock();
        if state.in_flight.as_ref().map(|f| f.id) == Some(id) {
            state.in_flight = None;
        }
    }
}

async fn run_fetch(
    coordinator: RequestCoordinator,
    id: u64,
    window: TemporalWindow,
    cancel: CancellationToken,
) -> Result<Arc<FluxResult>, FetchError> {
    let records = match fetch_with_retries(&coordinator, &window, &cancel).await {
        Ok(records) if !cancel.is_cancelled() => records,
        Ok(_) => {
            coordinator.abandon(id);
            return Err(FetchError::Cancelled);
        }
        Err(e) => {
            coordinator.abandon(id);
            return Err(e);
        }
    };

    let result = Arc::new(FluxResult::build(window, records, &coordinator.registry));
    coordinator.complete(id, window, &cancel, &result);
    Ok(result)
}

async fn fetch_with_retries(
    coordinator: &RequestCoordinator,
    window: &TemporalWindow,
    cancel: &CancellationToken,
) -> Result<Vec<FluxRecord>, FetchError> {
    let config = &coordinator.config;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        match coordinator.source.fetch(window, cancel).await {
            Ok(records) => return Ok(records),
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.retry_delay * 2u32.saturating_pow(attempt);
                attempt += 1;
                warn!(
                    "Flux fetch for {:?} failed ({}); retry {}/{} in {:?}",
                    window, e, attempt, config.max_retries, delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                warn!("Flux fetch for {:?} failed: {}", window, e);
                return Err(e);
            }
        }
    }
}
