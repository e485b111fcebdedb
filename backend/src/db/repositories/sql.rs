//! SQL text for the ClickHouse trip store.
//!
//! Trips are pre-split into `outbound_trips` (keyed by `start_station_id`,
//! filtered on `started_at`) and `inbound_trips` (keyed by `end_station_id`,
//! filtered on `ended_at`), each row carrying a trip count `c`.

use crate::services::predicate::FluxPredicates;

pub const OUTBOUND_TABLE: &str = "outbound_trips";
pub const INBOUND_TABLE: &str = "inbound_trips";
pub const STATIONS_TABLE: &str = "current_stations";

/// Per-station aggregate over both directions.
///
/// The FULL OUTER JOIN keeps stations that only appear on one side; the
/// missing side is reported as zero.
pub fn flux_sql(predicates: &FluxPredicates) -> String {
    format!(
        "SELECT coalesce(ot.station_id, it.station_id) AS stationId, \
                toUInt64(coalesce(it.c, 0)) AS inbound, \
                toUInt64(coalesce(ot.c, 0)) AS outbound \
         FROM ( \
             SELECT start_station_id AS station_id, SUM(c) AS c \
             FROM {outbound} \
             WHERE {started_at} \
             GROUP BY start_station_id \
         ) ot \
         FULL OUTER JOIN ( \
             SELECT end_station_id AS station_id, SUM(c) AS c \
             FROM {inbound} \
             WHERE {ended_at} \
             GROUP BY end_station_id \
         ) it \
         ON ot.station_id = it.station_id \
         SETTINGS join_use_nulls = 1",
        outbound = OUTBOUND_TABLE,
        inbound = INBOUND_TABLE,
        started_at = predicates.started_at.to_sql(),
        ended_at = predicates.ended_at.to_sql(),
    )
}

pub fn stations_sql() -> String {
    format!(
        "SELECT short_name AS stationId, \
                station_id AS currentStationId, \
                name AS stationName, \
                lat AS latitude, \
                lon AS longitude, \
                capacity \
         FROM {}",
        STATIONS_TABLE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TemporalWindow;

    #[test]
    fn test_flux_sql_filters_each_side_on_its_own_field() {
        let window =
            TemporalWindow::from_wire("20240101", "20240107", "060000", "100000", Some("1,2"))
                .unwrap();
        let sql = flux_sql(&FluxPredicates::for_window(&window));

        assert!(sql.contains("FULL OUTER JOIN"));
        assert!(sql.contains("toDayOfWeek(started_at, 2) IN (1,2)"));
        assert!(sql.contains("toDayOfWeek(ended_at, 2) IN (1,2)"));
        let outbound = sql.find("FROM outbound_trips").unwrap();
        let started = sql.find("started_at").unwrap();
        let inbound = sql.find("FROM inbound_trips").unwrap();
        assert!(outbound < started && started < inbound);
    }

    #[test]
    fn test_stations_sql() {
        let sql = stations_sql();
        assert!(sql.contains("short_name AS stationId"));
        assert!(sql.ends_with("FROM current_stations"));
    }
}
