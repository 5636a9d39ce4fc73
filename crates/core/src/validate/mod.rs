//! Visual validation stage.
//!
//! Runs cached payloads through the external visual-validation service and
//! records verdicts in the registry. The service gets a mandatory health
//! check once per run: a dead dependency aborts the run before any item
//! work, instead of burning the worker pool against it.

mod client;
mod stage;

pub use client::HttpValidator;
pub use stage::{ValidateStage, ValidateStats};

use async_trait::async_trait;

use crate::registry::ValidationOutcome;

/// Error type for validation service calls.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("Validation request timed out")]
    Timeout,

    #[error("Failed to connect to validation service: {0}")]
    ConnectionFailed(String),

    #[error("Validation service error: {0}")]
    ApiError(String),
}

/// Error type for the validation stage.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// The service failed its pre-flight health check. Fatal for the run.
    #[error("Validation service unavailable: {0}")]
    DependencyUnavailable(String),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error(transparent)]
    Batch(#[from] crate::batch::BatchError),
}

/// Trait for visual validation backends.
#[async_trait]
pub trait VisualValidator: Send + Sync {
    /// One-time readiness probe, called before any per-item work.
    async fn health(&self) -> Result<(), ValidatorError>;

    /// Validate one payload against its title and category.
    async fn verify(
        &self,
        image: Vec<u8>,
        title: &str,
        category: &str,
    ) -> Result<ValidationOutcome, ValidatorError>;
}
