//! Registry entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stages that consult the registry for resolution.
///
/// Classification is deliberately absent: its results flow through the
/// batch file only and are never registry-backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Validate,
}

/// Lifecycle status of a registry entry.
///
/// Transitions are forward-only, except that a failed fetch may be retried
/// on a later run until the configured attempt cap is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Fetched,
    FetchFailed,
    Validated,
    ValidationFailed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::FetchFailed => "FETCH_FAILED",
            EntryStatus::Fetched => "FETCHED",
            EntryStatus::Validated => "VALIDATED",
            EntryStatus::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(EntryStatus::Pending),
            "FETCHED" => Some(EntryStatus::Fetched),
            "FETCH_FAILED" => Some(EntryStatus::FetchFailed),
            "VALIDATED" => Some(EntryStatus::Validated),
            "VALIDATION_FAILED" => Some(EntryStatus::ValidationFailed),
            _ => None,
        }
    }
}

/// Per-detector scores reported by the visual validation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorScores {
    pub category_match: f64,
    pub product_match: f64,
    pub watermark_text: f64,
    pub placeholder_or_error: f64,
    pub low_quality: f64,
}

/// A delivered validation verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub confidence: f64,
    pub detections: DetectorScores,
}

/// Outcome of a single fetch operation, returned as a value rather than
/// raised, so the batch loop can aggregate without exception branching.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRecord {
    /// Payload is in the content store.
    Fetched {
        /// HTTP status of the download; `None` when the payload was found
        /// already cached on disk and no request was issued.
        http_code: Option<u16>,
        /// Relative path into the content store.
        storage_path: String,
        /// True when resolved by a store hit rather than a network fetch.
        /// Cache hits do not count as attempts.
        from_cache: bool,
    },
    /// The fetch failed (timeout, transport error, or non-2xx response).
    Failed {
        http_code: Option<u16>,
    },
}

/// A fetch result paired with the identity needed to create its entry.
#[derive(Debug, Clone)]
pub struct FetchCommit {
    pub id: String,
    pub url: String,
    pub record: FetchRecord,
}

/// One row of the registry.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub id: String,
    pub source_url: String,
    pub status: EntryStatus,
    pub storage_path: Option<String>,
    pub http_code: Option<u16>,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub validation: Option<ValidationOutcome>,
}

/// Per-status entry counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    pub total: u64,
    pub pending: u64,
    pub fetched: u64,
    pub fetch_failed: u64,
    pub validated: u64,
    pub validation_failed: u64,
}
