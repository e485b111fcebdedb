//! Normalization of raw aggregate counts into comparable rates.
//!
//! Raw counts are summed over every qualifying day of a window, so windows of
//! different lengths are not comparable until divided by the number of
//! qualifying days and scaled by the width of the time-of-day range.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{seconds_of_day, DaysOfWeek, FluxRecord, TemporalWindow};

const SECONDS_PER_DAY: i64 = 86_400;

/// Number of days in `[start, end]` whose weekday is in `days`.
///
/// Closed form: extend the range to whole Sunday-based weeks, count every
/// selected weekday in those weeks, then remove the selected days of the
/// leading and trailing partial weeks that fall outside the range.
pub fn days_in_selection(start: NaiveDate, end: NaiveDate, days: DaysOfWeek) -> u32 {
    if end < start || days.is_empty() {
        return 0;
    }

    let start_index = DaysOfWeek::index_of(start.weekday());
    let end_index = DaysOfWeek::index_of(end.weekday());
    let week_start = start - Duration::days(i64::from(start_index));
    let week_end = end + Duration::days(i64::from(6 - end_index));
    let weeks = ((week_end - week_start).num_days() + 1) / 7;

    let with_excess = weeks as u32 * days.len();
    let leading = days.indices().filter(|d| *d < start_index).count() as u32;
    let trailing = days.indices().filter(|d| *d > end_index).count() as u32;

    with_excess - leading - trailing
}

/// Width of the time-of-day range in hours, wrap-aware.
///
/// `start == end` is a zero-width instant and yields `0.0`.
pub fn hours_in_selection(start: NaiveTime, end: NaiveTime) -> f64 {
    let start = i64::from(seconds_of_day(start));
    let end = i64::from(seconds_of_day(end));
    (end - start).rem_euclid(SECONDS_PER_DAY) as f64 / 3600.0
}

/// Divisors that turn raw counts for a window into per-hour rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationFactor {
    pub days_in_selection: u32,
    pub hours_in_selection: f64,
}

impl NormalizationFactor {
    pub fn for_window(window: &TemporalWindow) -> Self {
        Self {
            days_in_selection: days_in_selection(
                window.start_date(),
                window.end_date(),
                window.days_of_week(),
            ),
            hours_in_selection: hours_in_selection(window.start_time(), window.end_time()),
        }
    }

    /// No qualifying days or a zero-width time range: there is no data to show.
    pub fn is_degenerate(&self) -> bool {
        self.days_in_selection == 0 || self.hours_in_selection <= 0.0
    }

    pub fn rate_per_day(&self, raw: u64) -> Option<f64> {
        if self.days_in_selection == 0 {
            return None;
        }
        Some(raw as f64 / f64::from(self.days_in_selection))
    }

    /// `raw / days / 24 * hours`.
    pub fn rate_per_hour(&self, raw: u64) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        self.rate_per_day(raw)
            .map(|per_day| per_day / 24.0 * self.hours_in_selection)
    }

    /// Normalized `(inbound, outbound)`; flux and rides are derived afterwards.
    pub fn normalize(&self, record: &FluxRecord) -> Option<(f64, f64)> {
        Some((
            self.rate_per_hour(record.inbound)?,
            self.rate_per_hour(record.outbound)?,
        ))
    }
}
