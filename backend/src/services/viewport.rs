//! Flux statistics over the visible part of the map.
//!
//! Color and size scales are fitted to what is on screen, not to the whole
//! result set, so one extreme station off-screen does not wash out the rest.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::{FluxPoint, Location};
use crate::services::debounce::{Debouncer, Invoker};

/// Default coalescing interval for viewport movement.
pub const DEFAULT_VIEWPORT_DEBOUNCE: Duration = Duration::from_millis(10);

/// Extrema that drive the color and radius scales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportStats {
    pub min_flux: f64,
    pub max_flux: f64,
    pub max_rides: f64,
}

impl ViewportStats {
    /// Extrema over `points`, or `None` when there are none.
    ///
    /// Non-finite values are ignored; an extremum with no finite value is 0.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a FluxPoint>,
    {
        let mut seen = false;
        let mut min_flux = f64::INFINITY;
        let mut max_flux = f64::NEG_INFINITY;
        let mut max_rides = f64::NEG_INFINITY;

        for point in points {
            seen = true;
            if point.flux.is_finite() {
                min_flux = min_flux.min(point.flux);
                max_flux = max_flux.max(point.flux);
            }
            if point.rides.is_finite() {
                max_rides = max_rides.max(point.rides);
            }
        }

        seen.then(|| Self {
            min_flux: finite_or_zero(min_flux),
            max_flux: finite_or_zero(max_flux),
            max_rides: finite_or_zero(max_rides),
        })
    }

    /// Nothing worth encoding: no rides, or no flux in either direction.
    pub fn is_degenerate(&self) -> bool {
        self.max_rides <= 0.0 || (self.min_flux == 0.0 && self.max_flux == 0.0)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Decides which stations are currently rendered.
pub trait Visibility: Send + Sync {
    fn is_visible(&self, point: &FluxPoint) -> bool;
}

/// Everything is visible (no viewport known yet).
#[derive(Debug, Clone, Copy, Default)]
pub struct AllVisible;

impl Visibility for AllVisible {
    fn is_visible(&self, _point: &FluxPoint) -> bool {
        true
    }
}

/// Geographic viewport. `west > east` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn contains(&self, location: Location) -> bool {
        let lat_ok = self.south <= location.latitude && location.latitude <= self.north;
        let lon_ok = if self.west <= self.east {
            self.west <= location.longitude && location.longitude <= self.east
        } else {
            location.longitude >= self.west || location.longitude <= self.east
        };
        lat_ok && lon_ok
    }
}

impl Visibility for BoundingBox {
    fn is_visible(&self, point: &FluxPoint) -> bool {
        self.contains(point.location)
    }
}

/// Station ids reported as rendered by the map.
impl Visibility for HashSet<String> {
    fn is_visible(&self, point: &FluxPoint) -> bool {
        self.contains(&point.station_id)
    }
}

/// Holds the last stats and refits them to the visible subset.
#[derive(Debug, Clone, Default)]
pub struct ViewportStatsTracker {
    stats: ViewportStats,
}

impl ViewportStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ViewportStats {
        self.stats
    }

    /// Recompute over the visible points; returns whether the stats changed.
    ///
    /// With nothing visible the previous stats are kept.
    pub fn recompute(&mut self, points: &[FluxPoint], visibility: &dyn Visibility) -> bool {
        let visible = points.iter().filter(|p| visibility.is_visible(p));
        match ViewportStats::from_points(visible) {
            Some(stats) if stats != self.stats => {
                self.stats = stats;
                true
            }
            Some(_) => false,
            None => {
                debug!("No visible stations; keeping previous viewport stats");
                false
            }
        }
    }
}

struct WatcherState {
    tracker: ViewportStatsTracker,
    points: Arc<Vec<FluxPoint>>,
    viewport: Arc<dyn Visibility>,
}

impl WatcherState {
    fn refresh(&mut self, stats_tx: &watch::Sender<ViewportStats>) {
        if self.tracker.recompute(&self.points, self.viewport.as_ref()) {
            let stats = self.tracker.stats();
            stats_tx.send_if_modified(|current| {
                if *current == stats {
                    false
                } else {
                    *current = stats;
                    true
                }
            });
        }
    }
}

/// Keeps [`ViewportStats`] current as data arrives and the viewport moves.
///
/// New data is applied immediately; viewport movement is debounced so a
/// continuous pan recomputes at most once per quiet interval. Must be created
/// inside a Tokio runtime.
pub struct ViewportWatcher {
    state: Arc<Mutex<WatcherState>>,
    stats_tx: Arc<watch::Sender<ViewportStats>>,
    moved: Invoker,
    _debouncer: Debouncer,
}

impl ViewportWatcher {
    pub fn new(delay: Duration) -> Self {
        let state = Arc::new(Mutex::new(WatcherState {
            tracker: ViewportStatsTracker::new(),
            points: Arc::new(Vec::new()),
            viewport: Arc::new(AllVisible),
        }));
        let (stats_tx, _) = watch::channel(ViewportStats::default());
        let stats_tx = Arc::new(stats_tx);

        let debouncer = {
            let state = state.clone();
            let stats_tx = stats_tx.clone();
            Debouncer::new(delay, move || state.lock().refresh(&stats_tx))
        };

        Self {
            state,
            stats_tx,
            moved: debouncer.invoker(),
            _debouncer: debouncer,
        }
    }

    /// Replace the data set and recompute right away.
    pub fn set_data(&self, points: impl Into<Arc<Vec<FluxPoint>>>) {
        let mut state = self.state.lock();
        state.points = points.into();
        state.refresh(&self.stats_tx);
    }

    /// Record a new viewport; the recomputation is debounced.
    pub fn viewport_moved<V: Visibility + 'static>(&self, viewport: V) {
        self.state.lock().viewport = Arc::new(viewport);
        self.moved.call();
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewportStats> {
        self.stats_tx.subscribe()
    }

    pub fn stats(&self) -> ViewportStats {
        *self.stats_tx.borrow()
    }
}

impl Default for ViewportWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_DEBOUNCE)
    }
}
