//! Mock visual-validation backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::registry::{DetectorScores, ValidationOutcome};
use crate::validate::{ValidatorError, VisualValidator};

/// Validator mock with a scripted health state and verdict, counting calls.
pub struct MockValidator {
    healthy: bool,
    outcome: ValidationOutcome,
    /// Payloads whose bytes equal this marker fail with a transport error.
    fail_on_bytes: Option<Vec<u8>>,
    health_calls: AtomicU64,
    verify_calls: AtomicU64,
}

impl MockValidator {
    /// Healthy service returning the given verdict for every payload.
    pub fn healthy(outcome: ValidationOutcome) -> Self {
        Self {
            healthy: true,
            outcome,
            fail_on_bytes: None,
            health_calls: AtomicU64::new(0),
            verify_calls: AtomicU64::new(0),
        }
    }

    /// Healthy service that accepts everything.
    pub fn accepting() -> Self {
        Self::healthy(ValidationOutcome {
            is_valid: true,
            confidence: 0.95,
            detections: DetectorScores::default(),
        })
    }

    /// Service that fails its health check.
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            outcome: ValidationOutcome {
                is_valid: false,
                confidence: 0.0,
                detections: DetectorScores::default(),
            },
            fail_on_bytes: None,
            health_calls: AtomicU64::new(0),
            verify_calls: AtomicU64::new(0),
        }
    }

    /// Fail verification for payloads with exactly these bytes.
    pub fn failing_for(mut self, bytes: &[u8]) -> Self {
        self.fail_on_bytes = Some(bytes.to_vec());
        self
    }

    /// Number of health calls observed.
    pub fn health_calls(&self) -> u64 {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// Number of verify calls observed.
    pub fn verify_calls(&self) -> u64 {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisualValidator for MockValidator {
    async fn health(&self) -> Result<(), ValidatorError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy {
            Ok(())
        } else {
            Err(ValidatorError::ConnectionFailed("mock offline".to_string()))
        }
    }

    async fn verify(
        &self,
        image: Vec<u8>,
        _title: &str,
        _category: &str,
    ) -> Result<ValidationOutcome, ValidatorError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref marker) = self.fail_on_bytes {
            if image == *marker {
                return Err(ValidatorError::ApiError("mock failure".to_string()));
            }
        }
        Ok(self.outcome.clone())
    }
}
