//! stockpix-core - resumable, content-addressed catalog ingestion.
//!
//! The pipeline moves product batches through fetch -> classify ->
//! validate -> archive. Progress is durable: a per-URL registry and a
//! content-addressed payload store make every per-item operation
//! idempotent, so a crash or restart never repeats finished work.

pub mod batch;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod fetcher;
pub mod ident;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod store;
pub mod testing;
pub mod validate;

pub use batch::{extract_urls, read_batch, write_batch, BatchError, BatchRow};
pub use classify::{Classifier, ClassifyError, ClassifyStage, ClassifyStats, HttpClassifier};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use coordinator::{BatchState, CoordinatorError, CycleStats, StageAreas, StageCoordinator};
pub use fetcher::{FetchError, FetchScheduler, FetchStats};
pub use ident::{content_id, normalize_url};
pub use pool::{ItemOutcome, PoolStats, TransformPool};
pub use registry::{
    DetectorScores, EntryStatus, FetchCommit, FetchRecord, Registry, RegistryEntry, RegistryError,
    RegistryStats, SqliteRegistry, Stage, ValidationOutcome,
};
pub use store::{ContentStore, FsStore, StoreError};
pub use validate::{
    HttpValidator, ValidateError, ValidateStage, ValidateStats, ValidatorError, VisualValidator,
};
