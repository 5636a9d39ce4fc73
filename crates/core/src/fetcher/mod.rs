//! Bounded fetch scheduler.
//!
//! Takes the candidate URLs extracted from a batch, skips everything the
//! registry or content store already resolved, and downloads the rest under
//! a fixed concurrency ceiling. Results are drained and committed to the
//! registry in fixed-size chunks: the chunk bounds memory on very large
//! batches and amortizes registry transactions, at the cost of a small
//! replay window after a crash (replayed items are found cached on disk
//! and registered without a second download).

mod scheduler;

pub use scheduler::FetchScheduler;

use serde::Serialize;

/// Error type for fetch scheduling.
///
/// Per-item network failures are not errors - they are recorded in the
/// registry and absorbed. Only infrastructure faults surface here.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),
}

/// Per-batch fetch counters, logged as the batch summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Network fetches issued.
    pub attempted: u64,
    /// Downloads that reached the store.
    pub fetched: u64,
    /// Fetches that failed (timeout, transport, non-2xx).
    pub failed: u64,
    /// Items resolved by a store hit without a network call.
    pub cached: u64,
    /// Items the registry had already resolved.
    pub skipped_resolved: u64,
    /// References dropped before scheduling (empty / non-HTTP).
    pub skipped_malformed: u64,
    /// Duplicate references within the batch.
    pub deduplicated: u64,
}
