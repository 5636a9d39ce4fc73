//! Content-addressed payload store.
//!
//! Holds downloaded binaries keyed by content id, decoupled from the
//! registry: "is it on disk" and "is it registered" are separate questions.
//! The existence check is the cheap cache-hit test consulted before any
//! network call, and the mechanism that makes a lost registry commit
//! recoverable without a second download.

mod fs_store;

pub use fs_store::FsStore;

use async_trait::async_trait;

/// Error type for content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No payload stored under this id.
    #[error("No stored payload for id: {0}")]
    NotFound(String),

    /// Filesystem error.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for content-addressed payload storage.
///
/// Writes are idempotent: re-writing identical content under the same id is
/// harmless, and paths are disjoint per id, so no locking is required.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether a payload is stored under this id.
    async fn exists(&self, id: &str) -> bool;

    /// Read the stored payload.
    async fn read(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Write a payload, creating parent shard directories as needed.
    ///
    /// Returns the relative path of the stored payload.
    async fn write(&self, id: &str, bytes: &[u8]) -> Result<String, StoreError>;

    /// The relative path a payload for this id lives at (whether or not it
    /// exists yet).
    fn rel_path(&self, id: &str) -> String;
}
