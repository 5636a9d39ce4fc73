//! Registry - the durable per-URL progress ledger.
//!
//! The registry is the single source of truth for "has this item been
//! processed". Every other component reads it or requests mutations through
//! its interface; nothing else touches the underlying store. Entries are
//! never deleted - the table doubles as a permanent dedup/audit ledger.

mod sqlite;
mod types;

pub use sqlite::SqliteRegistry;
pub use types::*;

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Mutation requested for an identifier the registry has never seen.
    /// Indicates a logic fault in the caller, not a data condition.
    #[error("Registry entry not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("Registry database error: {0}")]
    Database(String),
}

/// Trait for registry storage backends.
///
/// Mutations are serialized by the implementation (single-writer
/// discipline); reads may run concurrently. Callers that produce results
/// in volume use the chunk commit operations, which apply a bounded set of
/// mutations in one transaction.
pub trait Registry: Send + Sync {
    /// Look up an entry by content id.
    fn lookup(&self, id: &str) -> Result<Option<RegistryEntry>, RegistryError>;

    /// Create an entry in `Pending` if absent. No-op if present.
    fn upsert_pending(&self, id: &str, url: &str) -> Result<(), RegistryError>;

    /// Record a fetch outcome, transitioning to `Fetched`/`FetchFailed`.
    ///
    /// Fails with [`RegistryError::NotFound`] if the entry is absent.
    /// Entries that already reached a validation verdict are left untouched
    /// (status transitions are forward-only).
    fn mark_fetch_result(&self, id: &str, record: &FetchRecord) -> Result<(), RegistryError>;

    /// Record a validation verdict, transitioning to
    /// `Validated`/`ValidationFailed`.
    ///
    /// Fails with [`RegistryError::NotFound`] if the entry is absent.
    fn mark_validation_result(
        &self,
        id: &str,
        outcome: &ValidationOutcome,
    ) -> Result<(), RegistryError>;

    /// Whether the entry already records a terminal outcome for `stage`,
    /// meaning work for it may be skipped.
    fn is_resolved(&self, id: &str, stage: Stage) -> Result<bool, RegistryError>;

    /// Apply a chunk of fetch results (entry creation included) in a single
    /// transaction.
    fn commit_fetch_chunk(&self, commits: &[FetchCommit]) -> Result<(), RegistryError>;

    /// Apply a chunk of validation verdicts in a single transaction.
    fn commit_validation_chunk(
        &self,
        commits: &[(String, ValidationOutcome)],
    ) -> Result<(), RegistryError>;

    /// Per-status entry counts, for run summaries.
    fn stats(&self) -> Result<RegistryStats, RegistryError>;
}
