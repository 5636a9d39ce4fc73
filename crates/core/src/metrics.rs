//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Fetch scheduler (downloads, cache hits, failures)
//! - Stage workers (classification, validation)
//! - Pipeline coordinator (batches per stage)
//! - External services (classifier, validator)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Fetch Scheduler Metrics
// =============================================================================

/// Fetch results total by outcome.
pub static FETCH_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stockpix_fetch_results_total", "Total fetch results"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Registry commit chunk sizes.
pub static REGISTRY_COMMIT_SIZE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "stockpix_registry_commit_size",
            "Number of mutations per registry commit",
        )
        .buckets(vec![1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0]),
        &["stage"], // "fetch", "validate"
    )
    .unwrap()
});

// =============================================================================
// Stage Worker Metrics
// =============================================================================

/// Classification results total by outcome.
pub static ITEMS_CLASSIFIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stockpix_items_classified_total",
            "Total classification results",
        ),
        &["result"], // "categorized", "uncategorized"
    )
    .unwrap()
});

/// Validation results total by outcome.
pub static ITEMS_VALIDATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stockpix_items_validated_total", "Total validation results"),
        &["result"], // "valid", "rejected", "failed", "skipped"
    )
    .unwrap()
});

// =============================================================================
// Pipeline Coordinator Metrics
// =============================================================================

/// Batches completed total by stage.
pub static BATCHES_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stockpix_batches_completed_total",
            "Total batches completed per stage",
        ),
        &["stage"], // "fetch", "classify", "validate", "archive"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "stockpix_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stockpix_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Fetch
        Box::new(FETCH_RESULTS.clone()),
        Box::new(REGISTRY_COMMIT_SIZE.clone()),
        // Stage workers
        Box::new(ITEMS_CLASSIFIED.clone()),
        Box::new(ITEMS_VALIDATED.clone()),
        // Coordinator
        Box::new(BATCHES_COMPLETED.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
