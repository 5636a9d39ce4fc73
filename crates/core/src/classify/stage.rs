//! Classification stage runner.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{strip_html, Classifier, ClassifyError};
use crate::batch::{read_batch, write_batch, BatchRow};
use crate::config::ClassifierConfig;
use crate::metrics;
use crate::pool::{ItemOutcome, TransformPool};

/// Progress report interval, in items.
const PROGRESS_EVERY: usize = 100;

/// How much of the cleaned body joins the description in the snippet.
const BODY_SNIPPET_CHARS: usize = 200;

/// Per-batch classification counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassifyStats {
    pub rows_in: u64,
    /// Rows dropped for having no image reference.
    pub rows_skipped: u64,
    pub categorized: u64,
    pub uncategorized: u64,
    /// Rows written after image-list explosion.
    pub rows_out: u64,
}

/// Classification stage: enrich rows with a category, then explode each
/// row's image list into one row per URL.
pub struct ClassifyStage {
    classifier: Arc<dyn Classifier>,
    workers: usize,
    snippet_max_chars: usize,
}

impl ClassifyStage {
    pub fn new(classifier: Arc<dyn Classifier>, config: &ClassifierConfig) -> Self {
        Self {
            classifier,
            workers: config.workers,
            snippet_max_chars: config.snippet_max_chars,
        }
    }

    /// Process one batch: read `input`, classify, explode, and atomically
    /// write the transformed batch to `output`.
    ///
    /// The output lands under a unique temp name first and is renamed into
    /// place, so a partially-written batch is never visible to the next
    /// stage.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<ClassifyStats, ClassifyError> {
        let rows = read_batch(input)?;
        let mut stats = ClassifyStats {
            rows_in: rows.len() as u64,
            ..Default::default()
        };

        // Rows without an image reference have nothing downstream to
        // validate; drop them here with a diagnostic.
        let mut kept: Vec<BatchRow> = Vec::with_capacity(rows.len());
        for mut row in rows {
            if row.image_urls().is_empty() {
                stats.rows_skipped += 1;
                continue;
            }
            row.body = strip_html(&row.body);
            kept.push(row);
        }
        if stats.rows_skipped > 0 {
            warn!(
                skipped = stats.rows_skipped,
                "Rows without image references dropped"
            );
        }

        let items: Vec<(usize, String, String)> = kept
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let snippet =
                    build_snippet(&row.description, &row.body, self.snippet_max_chars);
                (idx, row.title.clone(), snippet)
            })
            .collect();

        let pool = TransformPool::new("classify", self.workers, PROGRESS_EVERY);
        let classifier = Arc::clone(&self.classifier);
        let pool_stats = pool
            .run(
                items,
                move |(idx, title, snippet)| {
                    let classifier = Arc::clone(&classifier);
                    async move {
                        let category = classifier.classify(&title, &snippet).await;
                        ItemOutcome::Transformed((idx, category.unwrap_or_default()))
                    }
                },
                |(idx, category): (usize, String)| {
                    if category.is_empty() {
                        stats.uncategorized += 1;
                        metrics::ITEMS_CLASSIFIED
                            .with_label_values(&["uncategorized"])
                            .inc();
                    } else {
                        stats.categorized += 1;
                        metrics::ITEMS_CLASSIFIED
                            .with_label_values(&["categorized"])
                            .inc();
                    }
                    kept[idx].category = category;
                },
            )
            .await;

        // Explode multi-URL image lists so every downstream item carries
        // exactly one reference.
        let mut out_rows = Vec::with_capacity(kept.len());
        for row in &kept {
            for url in row.image_urls() {
                let mut exploded = row.clone();
                exploded.images = url;
                out_rows.push(exploded);
            }
        }
        stats.rows_out = out_rows.len() as u64;

        let file_name = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "batch.csv".to_string());
        let tmp = output.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
        write_batch(&tmp, &out_rows)?;
        std::fs::rename(&tmp, output)?;

        info!(
            rows_in = stats.rows_in,
            rows_out = stats.rows_out,
            categorized = stats.categorized,
            uncategorized = stats.uncategorized,
            failed = pool_stats.failed,
            "Classification complete"
        );

        Ok(stats)
    }
}

/// Description plus a bounded slice of the cleaned body, capped at the
/// configured snippet length (char-boundary safe).
fn build_snippet(description: &str, body: &str, max_chars: usize) -> String {
    let body_snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
    let joined = format!("{} {}", description, body_snippet);
    joined.trim().chars().take(max_chars).collect()
}
