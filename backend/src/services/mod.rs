//! Service layer: the flux pipeline between the store and the renderer.
//!
//! Server side, [`predicate`] turns a window into store filters and [`flux`]
//! streams the aggregate through [`stream`]. Client side, [`coordinator`]
//! fetches and normalizes results, [`viewport`] fits statistics to what is on
//! screen, and [`color`] turns them into render scales.

pub mod color;
pub mod coordinator;
pub mod debounce;
pub mod flux;
pub mod normalization;
pub mod predicate;
pub mod stream;
pub mod viewport;

pub use color::{ColorBin, ColorBinner, ColorBinnerConfig, FluxColorScale, LegendEntry, Rgb};
pub use coordinator::{
    CoordinatorConfig, FetchError, FluxResult, FluxSource, Outcome, RequestCoordinator,
};
pub use debounce::{Debouncer, Edge, Invoker};
pub use flux::{join_stations, load_station_registry, stream_flux, RepositoryFluxSource};
pub use normalization::{days_in_selection, hours_in_selection, NormalizationFactor};
pub use predicate::{build_predicate, FieldPredicate, FluxPredicates, TimestampPredicate, TripField};
pub use stream::{decode_records, decode_stream, encode_record, encode_records, LineDecoder};
pub use viewport::{
    AllVisible, BoundingBox, ViewportStats, ViewportStatsTracker, ViewportWatcher, Visibility,
};
