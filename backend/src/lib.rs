//! # Flux Map Backend
//!
//! Bike-share station flux: how many trips arrive at and depart from each
//! station over a user-selected time window, normalized so windows of
//! different lengths are comparable, and encoded for a map.
//!
//! ## Features
//!
//! - **Temporal windows**: date range, possibly-wrapping time-of-day range and
//!   weekday set, parsed from the compact `YYYYMMDD` / `HHMMSS` wire format
//! - **Predicates**: the same window evaluable in Rust and rendered as SQL
//! - **Normalization**: per-day and per-hour rates from raw sums
//! - **Streaming**: NDJSON records written as the store yields them and decoded
//!   incrementally across arbitrary chunk boundaries
//! - **Request coordination**: cancellation of superseded requests,
//!   de-duplication, a TTL cache and bounded retries
//! - **Rendering scales**: viewport-restricted statistics, diverging color bins,
//!   radius scale and legend
//! - **HTTP API**: `/flux`, `/stations`, `/ping`, `/health`
//!
//! ## Architecture
//!
//! - [`models`]: windows, stations and flux records
//! - [`db`]: repository traits, local and ClickHouse stores
//! - [`services`]: the flux pipeline
//! - [`http`]: Axum-based HTTP server and request handlers
//! - [`client`]: HTTP flux source for the request coordinator

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod db;
pub mod models;
pub mod services;

#[cfg(feature = "http-client")]
pub mod client;

#[cfg(feature = "http-server")]
pub mod http;
