//! Stage-transform worker pool.
//!
//! Runs a per-item transformation over a batch with a fixed number of
//! concurrent workers. Results stream to a single collector callback, so
//! callers that persist outcomes (the validation stage) keep the registry's
//! single-writer discipline without extra locking, and progress is reported
//! at fixed item-count intervals rather than per item.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Outcome of a single item transformation, returned as a value so the
/// collector can aggregate without exception branching.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    /// The transformation produced a result.
    Transformed(T),
    /// The item was already resolved or had nothing to do.
    Skipped,
    /// The transformation failed; failures are item-local.
    Failed(String),
}

/// Aggregated pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub transformed: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl PoolStats {
    pub fn total(&self) -> u64 {
        self.transformed + self.skipped + self.failed
    }
}

/// Fixed-size concurrent worker pool for external per-item transformations.
pub struct TransformPool {
    label: &'static str,
    concurrency: usize,
    progress_every: usize,
}

impl TransformPool {
    /// Create a pool with the given worker count and progress interval.
    pub fn new(label: &'static str, concurrency: usize, progress_every: usize) -> Self {
        Self {
            label,
            concurrency,
            progress_every,
        }
    }

    /// Transform every item, invoking `on_result` on the collector side for
    /// each produced result as it arrives.
    ///
    /// Item failures never stop the remaining items; a panicking worker is
    /// counted as a failure.
    pub async fn run<I, T, F, Fut, C>(&self, items: Vec<I>, worker: F, mut on_result: C) -> PoolStats
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ItemOutcome<T>> + Send + 'static,
        C: FnMut(T),
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let worker = Arc::new(worker);
        let (tx, mut rx) = mpsc::channel::<ItemOutcome<T>>(self.concurrency.max(1));

        let mut tasks = JoinSet::new();
        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let worker = Arc::clone(&worker);
            let tx = tx.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome = worker(item).await;
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut stats = PoolStats::default();
        while let Some(outcome) = rx.recv().await {
            match outcome {
                ItemOutcome::Transformed(result) => {
                    stats.transformed += 1;
                    on_result(result);
                }
                ItemOutcome::Skipped => stats.skipped += 1,
                ItemOutcome::Failed(reason) => {
                    stats.failed += 1;
                    warn!(pool = self.label, reason = reason.as_str(), "Item failed");
                }
            }

            let done = stats.total();
            if self.progress_every > 0 && done as usize % self.progress_every == 0 {
                info!(
                    pool = self.label,
                    done,
                    total,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Progress"
                );
            }
        }

        // The channel closed, so every task either sent or died.
        while tasks.join_next().await.is_some() {}

        let completed = stats.total();
        if (completed as usize) < total {
            let aborted = total as u64 - completed;
            warn!(pool = self.label, aborted, "Workers aborted without a result");
            stats.failed += aborted;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_transforms_all_items() {
        let pool = TransformPool::new("test", 3, 0);
        let mut results = Vec::new();

        let stats = pool
            .run(
                vec![1u64, 2, 3, 4, 5],
                |n| async move { ItemOutcome::Transformed(n * 10) },
                |r| results.push(r),
            )
            .await;

        assert_eq!(stats.transformed, 5);
        assert_eq!(stats.failed, 0);
        results.sort();
        assert_eq!(results, vec![10, 20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn test_pool_counts_skips_and_failures() {
        let pool = TransformPool::new("test", 2, 0);

        let stats = pool
            .run(
                vec![0u64, 1, 2, 3, 4, 5],
                |n| async move {
                    match n % 3 {
                        0 => ItemOutcome::Skipped,
                        1 => ItemOutcome::Failed("boom".to_string()),
                        _ => ItemOutcome::Transformed(n),
                    }
                },
                |_: u64| {},
            )
            .await;

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.transformed, 2);
    }

    #[tokio::test]
    async fn test_pool_respects_concurrency_bound() {
        let pool = TransformPool::new("test", 2, 0);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let active_ref = Arc::clone(&active);
        let peak_ref = Arc::clone(&peak);
        let stats = pool
            .run(
                (0..12u64).collect(),
                move |_| {
                    let active = Arc::clone(&active_ref);
                    let peak = Arc::clone(&peak_ref);
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        ItemOutcome::Transformed(())
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!(stats.transformed, 12);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_pool_counts_panicking_worker_as_failure() {
        let pool = TransformPool::new("test", 2, 0);

        let stats = pool
            .run(
                vec![1u64, 2, 3],
                |n| async move {
                    if n == 2 {
                        panic!("worker died");
                    }
                    ItemOutcome::Transformed(n)
                },
                |_: u64| {},
            )
            .await;

        assert_eq!(stats.transformed, 2);
        assert_eq!(stats.failed, 1);
    }
}
