#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use flux_map::db::repositories::{LocalRepository, Trip};
use flux_map::models::{Station, TemporalWindow};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn station(id: &str, latitude: f64, longitude: f64) -> Station {
    Station {
        station_id: id.to_string(),
        current_station_id: format!("{}-live", id),
        station_name: format!("Station {}", id),
        latitude,
        longitude,
        capacity: Some(20),
    }
}

/// `startDate=20240101 endDate=20240107 060000-100000`, Monday to Friday.
pub fn first_week_commute() -> TemporalWindow {
    TemporalWindow::from_wire("20240101", "20240107", "060000", "100000", Some("1,2,3,4,5"))
        .unwrap()
}

/// Stations A, B, C and trips with known counts for [`first_week_commute`].
///
/// Inside the window: 60 trips A -> B on Tuesday and 30 trips B -> A on
/// Wednesday, plus 4 trips Z -> Z for a station missing from the registry.
/// Everything involving C falls outside the window in one way or another.
pub fn commute_repository() -> LocalRepository {
    let stations = vec![
        station("A", 40.71, -74.00),
        station("B", 40.73, -73.99),
        station("C", 40.75, -73.98),
    ];

    let trips = vec![
        Trip::new("A", "B", ts("2024-01-02 07:00:00"), ts("2024-01-02 07:20:00")).times(60),
        Trip::new("B", "A", ts("2024-01-03 08:00:00"), ts("2024-01-03 08:30:00")).times(30),
        Trip::new("Z", "Z", ts("2024-01-04 09:00:00"), ts("2024-01-04 09:10:00")).times(4),
        // Saturday
        Trip::new("A", "C", ts("2024-01-06 07:00:00"), ts("2024-01-06 07:15:00")).times(9),
        // Outside the time of day
        Trip::new("C", "A", ts("2024-01-02 11:00:00"), ts("2024-01-02 11:30:00")).times(7),
        // Outside the date range
        Trip::new("C", "B", ts("2024-01-08 07:00:00"), ts("2024-01-08 07:30:00")).times(5),
    ];

    LocalRepository::with_data(stations, trips)
}
