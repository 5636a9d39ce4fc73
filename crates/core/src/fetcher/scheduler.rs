//! Fetch scheduler implementation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{FetchError, FetchStats};
use crate::config::FetcherConfig;
use crate::ident::{content_id, normalize_url};
use crate::metrics;
use crate::registry::{FetchCommit, FetchRecord, Registry, Stage};
use crate::store::ContentStore;

/// A scheduled item waiting for its chunk to commit.
enum PendingFetch {
    /// Resolved without a network call (store hit).
    Ready(FetchCommit),
    /// In-flight download task.
    InFlight {
        id: String,
        url: String,
        handle: JoinHandle<FetchRecord>,
    },
}

/// Bounded fetch scheduler.
pub struct FetchScheduler {
    registry: Arc<dyn Registry>,
    store: Arc<dyn ContentStore>,
    client: Client,
    config: FetcherConfig,
}

impl FetchScheduler {
    /// Create a scheduler with its own HTTP client (fixed per-request
    /// timeout, redirect following enabled).
    pub fn new(
        registry: Arc<dyn Registry>,
        store: Arc<dyn ContentStore>,
        config: FetcherConfig,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            registry,
            store,
            client,
            config,
        }
    }

    /// Fetch every not-yet-resolved URL in the list.
    ///
    /// At most `config.concurrency` requests are in flight at once;
    /// additional work queues until a slot frees. Results commit to the
    /// registry in chunks of `config.chunk_size`, each chunk only after all
    /// of its tasks resolved. Per-item failures are recorded, never raised.
    pub async fn run(&self, urls: &[String]) -> Result<FetchStats, FetchError> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut seen: HashSet<String> = HashSet::new();
        let mut stats = FetchStats::default();
        let mut pending: Vec<PendingFetch> = Vec::new();

        for raw in urls {
            let Some(url) = normalize_url(raw) else {
                stats.skipped_malformed += 1;
                debug!(reference = raw.as_str(), "Skipping malformed reference");
                continue;
            };
            let id = content_id(&url);

            if !seen.insert(id.clone()) {
                stats.deduplicated += 1;
                continue;
            }

            if self.registry.is_resolved(&id, Stage::Fetch)? {
                stats.skipped_resolved += 1;
                continue;
            }

            if self.store.exists(&id).await {
                // Already on disk but (at least possibly) unregistered -
                // the recovery path for a registry commit lost to a crash.
                stats.cached += 1;
                pending.push(PendingFetch::Ready(FetchCommit {
                    record: FetchRecord::Fetched {
                        http_code: None,
                        storage_path: self.store.rel_path(&id),
                        from_cache: true,
                    },
                    id,
                    url,
                }));
            } else {
                stats.attempted += 1;
                let handle = tokio::spawn(fetch_one(
                    self.client.clone(),
                    Arc::clone(&self.store),
                    Arc::clone(&semaphore),
                    url.clone(),
                    id.clone(),
                ));
                pending.push(PendingFetch::InFlight { id, url, handle });
            }

            if pending.len() >= self.config.chunk_size {
                let chunk = std::mem::take(&mut pending);
                self.commit_chunk(chunk, &mut stats).await?;
            }
        }

        if !pending.is_empty() {
            self.commit_chunk(pending, &mut stats).await?;
        }

        info!(
            attempted = stats.attempted,
            fetched = stats.fetched,
            failed = stats.failed,
            cached = stats.cached,
            skipped = stats.skipped_resolved,
            "Fetch run complete"
        );

        Ok(stats)
    }

    /// Wait for every task in the chunk, then commit the chunk's registry
    /// writes as one transaction.
    async fn commit_chunk(
        &self,
        chunk: Vec<PendingFetch>,
        stats: &mut FetchStats,
    ) -> Result<(), FetchError> {
        let mut commits = Vec::with_capacity(chunk.len());
        let mut in_flight = Vec::new();
        let mut handles = Vec::new();

        for item in chunk {
            match item {
                PendingFetch::Ready(commit) => commits.push(commit),
                PendingFetch::InFlight { id, url, handle } => {
                    in_flight.push((id, url));
                    handles.push(handle);
                }
            }
        }

        let joined = futures::future::join_all(handles).await;
        for ((id, url), result) in in_flight.into_iter().zip(joined) {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = id.as_str(), error = %e, "Fetch task aborted");
                    FetchRecord::Failed { http_code: None }
                }
            };
            commits.push(FetchCommit { id, url, record });
        }

        for commit in &commits {
            match &commit.record {
                FetchRecord::Fetched { from_cache, .. } => {
                    if !from_cache {
                        stats.fetched += 1;
                    }
                    metrics::FETCH_RESULTS.with_label_values(&["success"]).inc();
                }
                FetchRecord::Failed { .. } => {
                    stats.failed += 1;
                    metrics::FETCH_RESULTS.with_label_values(&["failed"]).inc();
                }
            }
        }

        metrics::REGISTRY_COMMIT_SIZE
            .with_label_values(&["fetch"])
            .observe(commits.len() as f64);
        self.registry.commit_fetch_chunk(&commits)?;

        debug!(
            committed = commits.len(),
            fetched = stats.fetched,
            failed = stats.failed,
            "Registry chunk committed"
        );

        Ok(())
    }
}

/// Download a single payload under the concurrency gate.
///
/// Returns a record, never an error: every failure mode (timeout,
/// transport error, non-2xx, store write failure) is a per-item outcome.
async fn fetch_one(
    client: Client,
    store: Arc<dyn ContentStore>,
    semaphore: Arc<Semaphore>,
    url: String,
    id: String,
) -> FetchRecord {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return FetchRecord::Failed { http_code: None };
    };

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url = url.as_str(), error = %e, "Fetch transport error");
            return FetchRecord::Failed {
                http_code: e.status().map(|s| s.as_u16()),
            };
        }
    };

    let status = response.status();
    if !status.is_success() {
        debug!(url = url.as_str(), code = status.as_u16(), "Fetch rejected");
        return FetchRecord::Failed {
            http_code: Some(status.as_u16()),
        };
    }

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(url = url.as_str(), error = %e, "Fetch body error");
            return FetchRecord::Failed {
                http_code: Some(status.as_u16()),
            };
        }
    };

    match store.write(&id, &bytes).await {
        Ok(storage_path) => FetchRecord::Fetched {
            http_code: Some(status.as_u16()),
            storage_path,
            from_cache: false,
        },
        Err(e) => {
            warn!(id = id.as_str(), error = %e, "Store write failed");
            FetchRecord::Failed {
                http_code: Some(status.as_u16()),
            }
        }
    }
}
