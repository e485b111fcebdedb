//! Repository traits for the trip store.
//!
//! The store is split by concern the same way the queries are:
//! [`StationRepository`] serves the station registry and [`FluxRepository`]
//! runs the per-station aggregate. [`FullRepository`] is what the server and
//! the pipeline hold.

pub mod error;
pub mod flux;
pub mod station;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use flux::{FluxRecordStream, FluxRepository};
pub use station::StationRepository;

/// Every repository capability the application needs.
pub trait FullRepository: StationRepository + FluxRepository {}

impl<T> FullRepository for T where T: StationRepository + FluxRepository {}
