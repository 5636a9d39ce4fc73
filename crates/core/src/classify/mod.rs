//! Classification stage.
//!
//! Enriches batch rows with a category from the external classification
//! service. Results flow only through the batch file - this stage never
//! touches the registry. A service miss (non-2xx, timeout, bad payload)
//! yields an empty category and is never fatal.

mod client;
mod html;
mod stage;

pub use client::HttpClassifier;
pub use html::strip_html;
pub use stage::{ClassifyStage, ClassifyStats};

use async_trait::async_trait;

/// Error type for the classification stage.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Batch(#[from] crate::batch::BatchError),

    #[error("Classify stage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for classification backends.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one item from its text. Returns `None` when the service
    /// could not produce a category; callers treat that as an empty
    /// category, not a failure.
    async fn classify(&self, title: &str, description: &str) -> Option<String>;
}
