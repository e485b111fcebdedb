//! Trip timestamp predicates.
//!
//! Turns a [`TemporalWindow`] into a rule over trip timestamps, evaluable in
//! Rust (`matches`) and renderable as a ClickHouse `WHERE` clause (`to_sql`).
//!
//! A timestamp `t` matches when its date lies in the inclusive date range,
//! its time of day lies in the (possibly wrapping) time range, and its
//! weekday is selected. Timestamps are compared at whole-second precision.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::models::{hhmmss, seconds_of_day, weekday_index, DaysOfWeek, TemporalWindow};

const SQL_DATE_FORMAT: &str = "%Y-%m-%d";
const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The trip timestamp column a predicate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripField {
    StartedAt,
    EndedAt,
}

impl TripField {
    pub fn column(self) -> &'static str {
        match self {
            TripField::StartedAt => "started_at",
            TripField::EndedAt => "ended_at",
        }
    }
}

/// Inclusive time-of-day range in seconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDayRange {
    /// `start <= t <= end`
    Within { start: u32, end: u32 },
    /// Crosses midnight: everything outside the open interval `(end, start)`.
    Wrapping { start: u32, end: u32 },
}

impl TimeOfDayRange {
    pub fn from_window(window: &TemporalWindow) -> Self {
        let start = seconds_of_day(window.start_time());
        let end = seconds_of_day(window.end_time());
        if start > end {
            TimeOfDayRange::Wrapping { start, end }
        } else {
            TimeOfDayRange::Within { start, end }
        }
    }

    pub fn contains(self, seconds: u32) -> bool {
        match self {
            TimeOfDayRange::Within { start, end } => start <= seconds && seconds <= end,
            TimeOfDayRange::Wrapping { start, end } => seconds >= start || seconds <= end,
        }
    }
}

/// Boolean rule over a single trip timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampPredicate {
    /// Matches nothing (empty weekday set).
    Never,
    /// Single non-wrapping day: one inclusive range over the full timestamp.
    SingleDay {
        from: NaiveDateTime,
        to: NaiveDateTime,
        days: DaysOfWeek,
    },
    /// Date range, time-of-day range and weekday set evaluated independently.
    Span {
        start_date: NaiveDate,
        end_date: NaiveDate,
        time: TimeOfDayRange,
        days: DaysOfWeek,
    },
}

impl TimestampPredicate {
    /// The predicate used for queries.
    ///
    /// Single-day non-wrapping windows are fused into one timestamp range;
    /// an empty weekday set yields [`TimestampPredicate::Never`].
    pub fn for_window(window: &TemporalWindow) -> Self {
        let days = window.days_of_week();
        if days.is_empty() {
            return TimestampPredicate::Never;
        }

        if window.is_single_day() && !window.wraps_midnight() {
            let date = window.start_date();
            return TimestampPredicate::SingleDay {
                from: date.and_time(window.start_time()),
                to: date.and_time(window.end_time()),
                days,
            };
        }

        Self::span(window)
    }

    /// The generic date ∧ time ∧ weekday formulation, whatever the window.
    pub fn span(window: &TemporalWindow) -> Self {
        TimestampPredicate::Span {
            start_date: window.start_date(),
            end_date: window.end_date(),
            time: TimeOfDayRange::from_window(window),
            days: window.days_of_week(),
        }
    }

    pub fn is_unsatisfiable(&self) -> bool {
        match self {
            TimestampPredicate::Never => true,
            TimestampPredicate::SingleDay { from, to, days } => from > to || days.is_empty(),
            TimestampPredicate::Span {
                start_date,
                end_date,
                days,
                ..
            } => start_date > end_date || days.is_empty(),
        }
    }

    pub fn matches(&self, timestamp: NaiveDateTime) -> bool {
        let t = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        let weekday = weekday_index(t.date());
        match self {
            TimestampPredicate::Never => false,
            TimestampPredicate::SingleDay { from, to, days } => {
                *from <= t && t <= *to && days.contains_index(weekday)
            }
            TimestampPredicate::Span {
                start_date,
                end_date,
                time,
                days,
            } => {
                let date = t.date();
                *start_date <= date
                    && date <= *end_date
                    && time.contains(seconds_of_day(t.time()))
                    && days.contains_index(weekday)
            }
        }
    }

    /// Render as a ClickHouse boolean expression over `column`.
    pub fn to_sql(&self, column: &str) -> String {
        match self {
            TimestampPredicate::Never => "0".to_string(),
            TimestampPredicate::SingleDay { from, to, days } => {
                let mut clauses = vec![format!(
                    "toDateTime({column}) BETWEEN toDateTime('{}') AND toDateTime('{}')",
                    from.format(SQL_DATETIME_FORMAT),
                    to.format(SQL_DATETIME_FORMAT),
                )];
                clauses.extend(weekday_sql(column, *days));
                clauses.join(" AND ")
            }
            TimestampPredicate::Span {
                start_date,
                end_date,
                time,
                days,
            } => {
                let mut clauses = vec![format!(
                    "toDate({column}) BETWEEN toDate('{}') AND toDate('{}')",
                    start_date.format(SQL_DATE_FORMAT),
                    end_date.format(SQL_DATE_FORMAT),
                )];
                let time_of_day = format!("(toYYYYMMDDhhmmss({column}) % 1000000)");
                clauses.push(match time {
                    TimeOfDayRange::Within { start, end } => format!(
                        "{time_of_day} BETWEEN {} AND {}",
                        seconds_to_hhmmss(*start),
                        seconds_to_hhmmss(*end)
                    ),
                    TimeOfDayRange::Wrapping { start, end } => format!(
                        "({time_of_day} >= {} OR {time_of_day} <= {})",
                        seconds_to_hhmmss(*start),
                        seconds_to_hhmmss(*end)
                    ),
                });
                clauses.extend(weekday_sql(column, *days));
                clauses.join(" AND ")
            }
        }
    }
}

fn seconds_to_hhmmss(seconds: u32) -> u32 {
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
        .map(hhmmss)
        .unwrap_or(0)
}

// toDayOfWeek mode 2 numbers Sunday = 0 .. Saturday = 6
fn weekday_sql(column: &str, days: DaysOfWeek) -> Option<String> {
    if days.is_all() {
        None
    } else {
        Some(format!("toDayOfWeek({column}, 2) IN ({days})"))
    }
}

/// A predicate bound to the trip column it filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPredicate {
    pub field: TripField,
    pub predicate: TimestampPredicate,
}

impl FieldPredicate {
    pub fn matches(&self, timestamp: NaiveDateTime) -> bool {
        self.predicate.matches(timestamp)
    }

    pub fn to_sql(&self) -> String {
        self.predicate.to_sql(self.field.column())
    }
}

/// Build the predicate for one trip timestamp field.
pub fn build_predicate(window: &TemporalWindow, field: TripField) -> FieldPredicate {
    FieldPredicate {
        field,
        predicate: TimestampPredicate::for_window(window),
    }
}

/// The pair of predicates an aggregate flux query needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxPredicates {
    /// Applied to trip starts; drives outbound counts
    pub started_at: FieldPredicate,
    /// Applied to trip ends; drives inbound counts
    pub ended_at: FieldPredicate,
}

impl FluxPredicates {
    pub fn for_window(window: &TemporalWindow) -> Self {
        Self {
            started_at: build_predicate(window, TripField::StartedAt),
            ended_at: build_predicate(window, TripField::EndedAt),
        }
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.started_at.predicate.is_unsatisfiable() && self.ended_at.predicate.is_unsatisfiable()
    }
}
