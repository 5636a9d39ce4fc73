//! Validation stage runner.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{ValidateError, VisualValidator};
use crate::batch::read_batch;
use crate::config::ValidatorConfig;
use crate::ident::{content_id, normalize_url};
use crate::metrics;
use crate::pool::{ItemOutcome, TransformPool};
use crate::registry::{Registry, Stage, ValidationOutcome};
use crate::store::ContentStore;

/// Fallbacks sent to the service when a row carries no text.
const DEFAULT_TITLE: &str = "product";
const DEFAULT_CATEGORY: &str = "general";

/// Per-batch validation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidateStats {
    pub rows: u64,
    /// Rows with no usable image reference.
    pub rows_malformed: u64,
    pub valid: u64,
    pub rejected: u64,
    /// Already resolved, or payload absent from the store.
    pub skipped: u64,
    /// Transport/decode failures; the item stays retryable.
    pub failed: u64,
}

/// One unit of validation work.
struct ValidateItem {
    id: String,
    title: String,
    category: String,
}

/// Validation stage: verdicts for every cached payload in a batch.
pub struct ValidateStage {
    registry: Arc<dyn Registry>,
    store: Arc<dyn ContentStore>,
    validator: Arc<dyn VisualValidator>,
    workers: usize,
    flush_every: usize,
}

impl ValidateStage {
    pub fn new(
        registry: Arc<dyn Registry>,
        store: Arc<dyn ContentStore>,
        validator: Arc<dyn VisualValidator>,
        config: &ValidatorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            validator,
            workers: config.workers,
            flush_every: config.flush_every,
        }
    }

    /// Process one batch.
    ///
    /// The service health check runs first and its failure is fatal;
    /// everything after that is item-local. Verdicts flush to the registry
    /// every `flush_every` items and once more at the end.
    pub async fn run(&self, batch: &Path) -> Result<ValidateStats, ValidateError> {
        self.validator
            .health()
            .await
            .map_err(|e| ValidateError::DependencyUnavailable(e.to_string()))?;

        let rows = read_batch(batch)?;
        let mut stats = ValidateStats {
            rows: rows.len() as u64,
            ..Default::default()
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(url) = row.primary_image().as_deref().and_then(normalize_url) else {
                stats.rows_malformed += 1;
                continue;
            };
            items.push(ValidateItem {
                id: content_id(&url),
                title: non_empty_or(&row.title, DEFAULT_TITLE),
                category: non_empty_or(&row.category, DEFAULT_CATEGORY),
            });
        }

        let pool = TransformPool::new("validate", self.workers, self.flush_every);
        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let validator = Arc::clone(&self.validator);

        let mut pending: Vec<(String, ValidationOutcome)> = Vec::new();
        let mut flush_error: Option<ValidateError> = None;

        let pool_stats = pool
            .run(
                items,
                move |item: ValidateItem| {
                    let registry = Arc::clone(&registry);
                    let store = Arc::clone(&store);
                    let validator = Arc::clone(&validator);
                    async move {
                        // The resume guarantee: a delivered verdict is
                        // never re-requested.
                        match registry.is_resolved(&item.id, Stage::Validate) {
                            Ok(true) => return ItemOutcome::Skipped,
                            Ok(false) => {}
                            Err(e) => return ItemOutcome::Failed(e.to_string()),
                        }

                        if !store.exists(&item.id).await {
                            debug!(id = item.id.as_str(), "Payload not cached, skipping");
                            return ItemOutcome::Skipped;
                        }

                        let bytes = match store.read(&item.id).await {
                            Ok(bytes) => bytes,
                            Err(e) => return ItemOutcome::Failed(e.to_string()),
                        };

                        match validator.verify(bytes, &item.title, &item.category).await {
                            Ok(outcome) => ItemOutcome::Transformed((item.id, outcome)),
                            Err(e) => ItemOutcome::Failed(e.to_string()),
                        }
                    }
                },
                |(id, outcome): (String, ValidationOutcome)| {
                    if outcome.is_valid {
                        stats.valid += 1;
                        metrics::ITEMS_VALIDATED.with_label_values(&["valid"]).inc();
                    } else {
                        stats.rejected += 1;
                        metrics::ITEMS_VALIDATED
                            .with_label_values(&["rejected"])
                            .inc();
                    }
                    pending.push((id, outcome));

                    if pending.len() >= self.flush_every && flush_error.is_none() {
                        metrics::REGISTRY_COMMIT_SIZE
                            .with_label_values(&["validate"])
                            .observe(pending.len() as f64);
                        match self.registry.commit_validation_chunk(&pending) {
                            Ok(()) => pending.clear(),
                            Err(e) => flush_error = Some(e.into()),
                        }
                    }
                },
            )
            .await;

        if let Some(e) = flush_error {
            return Err(e);
        }
        self.registry.commit_validation_chunk(&pending)?;

        stats.skipped += pool_stats.skipped;
        stats.failed += pool_stats.failed;
        metrics::ITEMS_VALIDATED
            .with_label_values(&["skipped"])
            .inc_by(pool_stats.skipped);
        metrics::ITEMS_VALIDATED
            .with_label_values(&["failed"])
            .inc_by(pool_stats.failed);

        if stats.failed > 0 {
            warn!(failed = stats.failed, "Items left retryable after failures");
        }
        info!(
            rows = stats.rows,
            valid = stats.valid,
            rejected = stats.rejected,
            skipped = stats.skipped,
            failed = stats.failed,
            "Validation complete"
        );

        Ok(stats)
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}
