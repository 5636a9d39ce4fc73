//! Pipeline stage coordinator.
//!
//! Treats each batch file as a unit of work: a batch is processed to
//! completion by one stage, then atomically relocated to the next stage's
//! input area. The coordinator is the sole authority for batch state
//! transitions; a crash mid-batch leaves the file where it was, safe to
//! reprocess because every per-item operation is idempotent.

mod runner;
mod types;

pub use runner::StageCoordinator;
pub use types::{BatchState, CycleStats, StageAreas};

/// Error type for the coordinator.
///
/// Only faults that must stop the run surface here; per-batch data errors
/// are logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A required external dependency failed its pre-flight check.
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error("Coordinator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crate::fetcher::FetchError> for CoordinatorError {
    fn from(e: crate::fetcher::FetchError) -> Self {
        match e {
            crate::fetcher::FetchError::Registry(e) => CoordinatorError::Registry(e),
        }
    }
}
