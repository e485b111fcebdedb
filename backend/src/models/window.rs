//! Temporal window model.
//!
//! A [`TemporalWindow`] is the canonical form of a user's filter selection:
//! an inclusive calendar date range, a time-of-day range that may cross
//! midnight, and a set of weekdays. It is the only request and cache key of
//! the flux pipeline, so it is a small `Copy` value with structural equality.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Wire format for calendar dates (`YYYYMMDD`).
pub const WIRE_DATE_FORMAT: &str = "%Y%m%d";

/// Wire format for times of day (`HHMMSS`).
pub const WIRE_TIME_FORMAT: &str = "%H%M%S";

/// Malformed window input. Rejected before any predicate is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Missing required parameter: {0}")]
    MissingField(&'static str),

    #[error("Invalid date '{value}' for {field}: expected YYYYMMDD")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid time '{value}' for {field}: expected HHMMSS")]
    InvalidTime { field: &'static str, value: String },

    #[error("Invalid day of week '{0}': expected 0 (Sunday) through 6 (Saturday)")]
    InvalidWeekday(String),

    #[error("startDate {start} is after endDate {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
}

/// Set of weekdays using the canonical numbering Sunday = 0 .. Saturday = 6.
///
/// Stored as a bitmask, so two sets with the same members always compare and
/// hash equal regardless of the order they were built in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const EMPTY: DaysOfWeek = DaysOfWeek(0);
    pub const ALL: DaysOfWeek = DaysOfWeek(0b111_1111);
    /// Monday through Friday.
    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(0b011_1110);
    /// Saturday and Sunday.
    pub const WEEKENDS: DaysOfWeek = DaysOfWeek(0b100_0001);

    /// Build a set from a raw bitmask; bits above Saturday are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Build a set from canonical day indices.
    pub fn from_indices<I>(indices: I) -> Result<Self, WindowError>
    where
        I: IntoIterator<Item = u8>,
    {
        indices.into_iter().try_fold(Self::EMPTY, |set, index| {
            if index > 6 {
                Err(WindowError::InvalidWeekday(index.to_string()))
            } else {
                Ok(Self(set.0 | (1 << index)))
            }
        })
    }

    /// Canonical index of a weekday.
    pub fn index_of(day: Weekday) -> u8 {
        day.num_days_from_sunday() as u8
    }

    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | (1 << Self::index_of(day)))
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.contains_index(Self::index_of(day))
    }

    pub fn contains_index(self, index: u8) -> bool {
        index < 7 && self.0 & (1 << index) != 0
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_all(self) -> bool {
        self == Self::ALL
    }

    /// Member indices in ascending order.
    pub fn indices(self) -> impl Iterator<Item = u8> {
        (0..7u8).filter(move |i| self.contains_index(*i))
    }
}

impl fmt::Debug for DaysOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
        f.debug_set()
            .entries(self.indices().map(|i| NAMES[i as usize]))
            .finish()
    }
}

/// Comma separated indices, e.g. `1,2,3,4,5`.
impl fmt::Display for DaysOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.indices().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for DaysOfWeek {
    type Err = WindowError;

    /// Parse a comma separated list of indices. An empty string is the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::EMPTY;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let index: u8 = part
                .parse()
                .map_err(|_| WindowError::InvalidWeekday(part.to_string()))?;
            set = set.union(Self::from_indices([index])?);
        }
        Ok(set)
    }
}

impl DaysOfWeek {
    fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl TryFrom<Vec<u8>> for DaysOfWeek {
    type Error = WindowError;

    fn try_from(indices: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_indices(indices)
    }
}

impl From<DaysOfWeek> for Vec<u8> {
    fn from(days: DaysOfWeek) -> Self {
        days.indices().collect()
    }
}

impl Serialize for DaysOfWeek {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.indices())
    }
}

impl<'de> Deserialize<'de> for DaysOfWeek {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let indices = Vec::<u8>::deserialize(deserializer)?;
        Self::from_indices(indices).map_err(serde::de::Error::custom)
    }
}

/// Immutable filter selection: dates, time of day and weekdays.
///
/// `start_time > end_time` is legal and denotes a window crossing midnight.
/// Times are held at whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemporalWindow {
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    days_of_week: DaysOfWeek,
}

impl TemporalWindow {
    /// Create a window, rejecting `start_date > end_date`.
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        days_of_week: DaysOfWeek,
    ) -> Result<Self, WindowError> {
        if start_date > end_date {
            return Err(WindowError::StartAfterEnd {
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            start_date,
            end_date,
            start_time: truncate_to_second(start_time),
            end_time: truncate_to_second(end_time),
            days_of_week,
        })
    }

    /// Parse a window from its wire representation.
    ///
    /// `days_of_week` of `None` selects every day; `Some("")` selects none.
    pub fn from_wire(
        start_date: &str,
        end_date: &str,
        start_time: &str,
        end_time: &str,
        days_of_week: Option<&str>,
    ) -> Result<Self, WindowError> {
        let days = match days_of_week {
            Some(raw) => raw.parse()?,
            None => DaysOfWeek::ALL,
        };

        Self::new(
            parse_wire_date("startDate", start_date)?,
            parse_wire_date("endDate", end_date)?,
            parse_wire_time("startTime", start_time)?,
            parse_wire_time("endTime", end_time)?,
            days,
        )
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end_time
    }

    pub fn days_of_week(&self) -> DaysOfWeek {
        self.days_of_week
    }

    pub fn is_single_day(&self) -> bool {
        self.start_date == self.end_date
    }

    /// True when the time-of-day range crosses midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.start_time > self.end_time
    }

    /// True when start and end times coincide.
    pub fn is_zero_width(&self) -> bool {
        self.start_time == self.end_time
    }

    /// Every calendar day in the date range, inclusive.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |d| *d <= end)
    }

    /// Copy of this window with a different weekday set.
    pub fn with_days(mut self, days_of_week: DaysOfWeek) -> Self {
        self.days_of_week = days_of_week;
        self
    }
}

/// Query-string / JSON form of a window, as sent between client and server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowParams {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<String>,
}

impl WindowParams {
    /// Validate and convert into a [`TemporalWindow`].
    pub fn parse(&self) -> Result<TemporalWindow, WindowError> {
        TemporalWindow::from_wire(
            required("startDate", &self.start_date)?,
            required("endDate", &self.end_date)?,
            required("startTime", &self.start_time)?,
            required("endTime", &self.end_time)?,
            self.days_of_week.as_deref(),
        )
    }
}

impl From<&TemporalWindow> for WindowParams {
    fn from(window: &TemporalWindow) -> Self {
        Self {
            start_date: Some(window.start_date.format(WIRE_DATE_FORMAT).to_string()),
            end_date: Some(window.end_date.format(WIRE_DATE_FORMAT).to_string()),
            start_time: Some(window.start_time.format(WIRE_TIME_FORMAT).to_string()),
            end_time: Some(window.end_time.format(WIRE_TIME_FORMAT).to_string()),
            days_of_week: Some(window.days_of_week.to_string()),
        }
    }
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, WindowError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(WindowError::MissingField(field)),
    }
}

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a `YYYYMMDD` date.
pub fn parse_wire_date(field: &'static str, value: &str) -> Result<NaiveDate, WindowError> {
    let invalid = || WindowError::InvalidDate {
        field,
        value: value.to_string(),
    };
    if !all_digits(value, 8) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, WIRE_DATE_FORMAT).map_err(|_| invalid())
}

/// Parse an `HHMMSS` time of day.
pub fn parse_wire_time(field: &'static str, value: &str) -> Result<NaiveTime, WindowError> {
    let invalid = || WindowError::InvalidTime {
        field,
        value: value.to_string(),
    };
    if !all_digits(value, 6) {
        return Err(invalid());
    }
    NaiveTime::parse_from_str(value, WIRE_TIME_FORMAT).map_err(|_| invalid())
}

/// Seconds since midnight, ignoring sub-second precision.
pub fn seconds_of_day(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight()
}

/// Time of day as the integer `HHMMSS`, e.g. 06:00:00 -> 60000.
pub fn hhmmss(time: NaiveTime) -> u32 {
    time.hour() * 10_000 + time.minute() * 100 + time.second()
}

fn truncate_to_second(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

/// Canonical weekday index of a date.
pub fn weekday_index(date: NaiveDate) -> u8 {
    DaysOfWeek::index_of(date.weekday())
}
