//! Mock implementations and helpers for testing.
//!
//! These are used by unit tests and integration tests across the crate.

mod mock_classifier;
mod mock_validator;

pub use mock_classifier::MockClassifier;
pub use mock_validator::MockValidator;

use std::path::Path;

use crate::batch::{write_batch, BatchRow};

/// Write a minimal batch file with one row per URL.
pub fn write_url_batch(path: &Path, urls: &[&str]) {
    let rows: Vec<BatchRow> = urls
        .iter()
        .map(|url| BatchRow {
            title: "item".to_string(),
            images: url.to_string(),
            ..Default::default()
        })
        .collect();
    write_batch(path, &rows).expect("Failed to write test batch");
}
