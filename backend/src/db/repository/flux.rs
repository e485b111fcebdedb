//! Flux aggregate queries.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::error::RepositoryResult;
use crate::models::FluxRecord;
use crate::services::predicate::FluxPredicates;

/// Records in the order the store yields them.
pub type FluxRecordStream = BoxStream<'static, RepositoryResult<FluxRecord>>;

/// Per-station inbound/outbound aggregation over trips.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait FluxRepository: Send + Sync {
    /// Count, per station, trips ending there whose `ended_at` matches and
    /// trips starting there whose `started_at` matches.
    ///
    /// A station with matches on only one side is reported with zero on the
    /// other. Records are yielded as soon as the store produces them;
    /// dropping the stream abandons the query.
    fn stream_flux(&self, predicates: &FluxPredicates) -> FluxRecordStream;

    /// Check whether the store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;
}
