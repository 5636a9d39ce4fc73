//! Mock classification backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::classify::Classifier;

/// Classifier mock returning a scripted category (or nothing) and counting
/// calls.
pub struct MockClassifier {
    category: Option<String>,
    calls: AtomicU64,
}

impl MockClassifier {
    /// Always returns the given category.
    pub fn fixed(category: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            calls: AtomicU64::new(0),
        }
    }

    /// Behaves like an unreachable service: every call yields no category.
    pub fn unavailable() -> Self {
        Self {
            category: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of classify calls observed.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, _title: &str, _description: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.category.clone()
    }
}
