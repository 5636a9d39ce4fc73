//! Coordinator run loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::types::{BatchState, CycleStats, StageAreas};
use super::CoordinatorError;
use crate::batch::{extract_urls, read_batch};
use crate::classify::ClassifyStage;
use crate::fetcher::FetchScheduler;
use crate::metrics;
use crate::validate::{ValidateError, ValidateStage};

/// Drives batches through fetch -> classify -> validate -> archive.
pub struct StageCoordinator {
    areas: StageAreas,
    fetcher: FetchScheduler,
    classify: ClassifyStage,
    validate: ValidateStage,
    poll_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl StageCoordinator {
    pub fn new(
        areas: StageAreas,
        fetcher: FetchScheduler,
        classify: ClassifyStage,
        validate: ValidateStage,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            areas,
            fetcher,
            classify,
            validate,
            poll_interval,
            shutdown_tx,
        }
    }

    /// The stage areas this coordinator works over.
    pub fn areas(&self) -> &StageAreas {
        &self.areas
    }

    /// Request a graceful stop of the run loop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Run the poll loop until a shutdown is requested or a fatal
    /// precondition fails.
    ///
    /// An empty inbox is the steady state; the loop idles for the poll
    /// interval and scans again.
    pub async fn run(&self) -> Result<(), CoordinatorError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Pipeline coordinator started");

        loop {
            let stats = self.run_once().await?;

            if stats.is_idle() {
                debug!("Stage areas idle, waiting for input");
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Coordinator received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            } else if shutdown_rx.try_recv().is_ok() {
                info!("Coordinator received shutdown signal");
                break;
            }
        }

        info!("Pipeline coordinator stopped");
        Ok(())
    }

    /// Scan every stage area once and process what is there.
    pub async fn run_once(&self) -> Result<CycleStats, CoordinatorError> {
        let mut stats = CycleStats::default();

        self.process_fetch_area(&mut stats).await?;
        self.process_classify_area(&mut stats).await?;
        self.process_validate_area(&mut stats).await?;
        self.archive_sweep(&mut stats).await?;

        Ok(stats)
    }

    /// Fetch stage: inbox -> fetched.
    async fn process_fetch_area(&self, stats: &mut CycleStats) -> Result<(), CoordinatorError> {
        for path in scan_batches(self.areas.area_for(BatchState::PendingFetch)).await? {
            let batch = batch_name(&path);
            info!(batch = batch.as_str(), state = BatchState::PendingFetch.name(), "Processing batch");

            let rows = match read_batch(&path) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(batch = batch.as_str(), error = %e, "Skipping unreadable batch");
                    continue;
                }
            };

            let urls = extract_urls(&rows);
            if urls.is_empty() {
                warn!(batch = batch.as_str(), "Batch has no item references");
            }

            let fetch_stats = self.fetcher.run(&urls).await?;
            info!(
                batch = batch.as_str(),
                state = BatchState::Fetched.name(),
                fetched = fetch_stats.fetched,
                failed = fetch_stats.failed,
                cached = fetch_stats.cached,
                skipped = fetch_stats.skipped_resolved,
                "Fetch stage complete"
            );

            // Only relocate once every item outcome is durably recorded.
            self.relocate(&path, BatchState::PendingClassify).await?;
            stats.batches_fetched += 1;
            metrics::BATCHES_COMPLETED.with_label_values(&["fetch"]).inc();
        }

        Ok(())
    }

    /// Classify stage: fetched -> classified (content is rewritten).
    async fn process_classify_area(&self, stats: &mut CycleStats) -> Result<(), CoordinatorError> {
        for path in scan_batches(self.areas.area_for(BatchState::PendingClassify)).await? {
            let batch = batch_name(&path);
            info!(batch = batch.as_str(), state = BatchState::PendingClassify.name(), "Processing batch");

            let output = self.areas.area_for(BatchState::PendingValidate).join(&batch);
            match self.classify.run(&path, &output).await {
                Ok(classify_stats) => {
                    info!(
                        batch = batch.as_str(),
                        state = BatchState::Classified.name(),
                        rows_out = classify_stats.rows_out,
                        categorized = classify_stats.categorized,
                        "Classify stage complete"
                    );
                    // The transformed batch already sits in the next area;
                    // drop the source copy.
                    tokio::fs::remove_file(&path).await?;
                    stats.batches_classified += 1;
                    metrics::BATCHES_COMPLETED
                        .with_label_values(&["classify"])
                        .inc();
                }
                Err(e) => {
                    warn!(batch = batch.as_str(), error = %e, "Classify stage failed, leaving batch in place");
                }
            }
        }

        Ok(())
    }

    /// Validate stage: classified -> validated.
    async fn process_validate_area(&self, stats: &mut CycleStats) -> Result<(), CoordinatorError> {
        for path in scan_batches(self.areas.area_for(BatchState::PendingValidate)).await? {
            let batch = batch_name(&path);
            info!(batch = batch.as_str(), state = BatchState::PendingValidate.name(), "Processing batch");

            match self.validate.run(&path).await {
                Ok(validate_stats) => {
                    info!(
                        batch = batch.as_str(),
                        state = BatchState::Done.name(),
                        valid = validate_stats.valid,
                        rejected = validate_stats.rejected,
                        skipped = validate_stats.skipped,
                        failed = validate_stats.failed,
                        "Validate stage complete"
                    );
                    self.relocate(&path, BatchState::Done).await?;
                    stats.batches_validated += 1;
                    metrics::BATCHES_COMPLETED
                        .with_label_values(&["validate"])
                        .inc();
                }
                Err(ValidateError::DependencyUnavailable(msg)) => {
                    return Err(CoordinatorError::DependencyUnavailable(msg));
                }
                Err(ValidateError::Registry(e)) => return Err(e.into()),
                Err(ValidateError::Batch(e)) => {
                    warn!(batch = batch.as_str(), error = %e, "Skipping unreadable batch");
                }
            }
        }

        Ok(())
    }

    /// Terminal sweep: validated -> archive.
    async fn archive_sweep(&self, stats: &mut CycleStats) -> Result<(), CoordinatorError> {
        for path in scan_batches(self.areas.area_for(BatchState::Done)).await? {
            let batch = batch_name(&path);
            let dest = self.areas.archive.join(&batch);
            tokio::fs::rename(&path, &dest).await?;
            info!(batch = batch.as_str(), "Batch archived");
            stats.batches_archived += 1;
            metrics::BATCHES_COMPLETED
                .with_label_values(&["archive"])
                .inc();
        }

        Ok(())
    }

    /// Atomically move a batch file into the area for its next state.
    async fn relocate(&self, path: &Path, state: BatchState) -> Result<(), CoordinatorError> {
        let dest = self.areas.area_for(state).join(batch_name(path));
        tokio::fs::rename(path, &dest).await?;
        Ok(())
    }
}

fn batch_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Recognized batch files in an area, lexicographic order.
///
/// Dot-prefixed names are in-progress temp writes and are ignored.
async fn scan_batches(area: &Path) -> Result<Vec<PathBuf>, CoordinatorError> {
    let mut entries = tokio::fs::read_dir(area).await?;
    let mut batches = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some("csv") && path.is_file() {
            batches.push(path);
        }
    }

    batches.sort();
    Ok(batches)
}
