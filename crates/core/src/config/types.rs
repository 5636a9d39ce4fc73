use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub classifier: ClassifierConfig,
    pub validator: ValidatorConfig,
}

/// Pipeline coordinator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Root directory holding the stage areas
    /// (inbox/fetched/classified/validated/archive).
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Idle poll interval when the inbox is empty (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_poll_interval() -> u64 {
    10
}

/// Registry database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("registry.db")
}

/// Content store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("imagery")
}

/// Fetch scheduler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// Maximum simultaneous in-flight downloads.
    #[serde(default = "default_fetch_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Results are drained and committed to the registry in chunks of this
    /// size, bounding memory on very large batches.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Attempt cap after which a failed fetch stops being retried on later
    /// runs (0 = retry forever).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency: default_fetch_concurrency(),
            timeout_secs: default_fetch_timeout(),
            chunk_size: default_chunk_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_fetch_concurrency() -> usize {
    5
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_chunk_size() -> usize {
    20
}

fn default_max_attempts() -> u32 {
    3
}

/// Classification service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Classification endpoint URL (e.g. "http://classifier:8000").
    pub url: String,
    /// API key sent as X-API-Key.
    pub api_key: String,
    /// Worker pool size for classification calls.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
    /// Description snippet length cap sent to the service.
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,
}

fn default_workers() -> usize {
    4
}

fn default_classifier_timeout() -> u64 {
    60
}

fn default_snippet_max_chars() -> usize {
    900
}

/// Visual validation service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorConfig {
    /// Validation endpoint URL (e.g. "http://validator:8000").
    pub url: String,
    /// API key sent as X-API-Key.
    pub api_key: String,
    /// Worker pool size for validation calls.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_validator_timeout")]
    pub timeout_secs: u64,
    /// Registry flush and progress-report interval, in items.
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

fn default_validator_timeout() -> u64 {
    20
}

fn default_flush_every() -> usize {
    100
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub pipeline: PipelineConfig,
    pub registry: RegistryConfig,
    pub store: StoreConfig,
    pub fetcher: FetcherConfig,
    pub classifier: SanitizedServiceConfig,
    pub validator: SanitizedServiceConfig,
}

/// Sanitized external service config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServiceConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub workers: usize,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            pipeline: config.pipeline.clone(),
            registry: config.registry.clone(),
            store: config.store.clone(),
            fetcher: config.fetcher.clone(),
            classifier: SanitizedServiceConfig {
                url: config.classifier.url.clone(),
                api_key_configured: !config.classifier.api_key.is_empty(),
                workers: config.classifier.workers,
                timeout_secs: config.classifier.timeout_secs,
            },
            validator: SanitizedServiceConfig {
                url: config.validator.url.clone(),
                api_key_configured: !config.validator.api_key.is_empty(),
                workers: config.validator.workers,
                timeout_secs: config.validator.timeout_secs,
            },
        }
    }
}
