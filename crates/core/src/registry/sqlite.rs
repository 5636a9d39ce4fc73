//! SQLite-backed registry implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    EntryStatus, FetchCommit, FetchRecord, Registry, RegistryEntry, RegistryError, RegistryStats,
    Stage, ValidationOutcome,
};
use crate::registry::DetectorScores;

/// SQLite-backed registry.
///
/// The connection is guarded by a mutex: there is exactly one writer lane,
/// and readers queue behind it for the short duration of each statement.
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
    /// Attempt cap after which a failed fetch counts as resolved.
    /// Zero disables the cap (failed items retry on every run).
    max_fetch_attempts: u32,
}

impl SqliteRegistry {
    /// Open (or create) a registry database at the given path.
    pub fn new(path: &Path, max_fetch_attempts: u32) -> Result<Self, RegistryError> {
        let conn = Connection::open(path).map_err(|e| RegistryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_fetch_attempts,
        })
    }

    /// Create an in-memory registry (useful for testing).
    pub fn in_memory(max_fetch_attempts: u32) -> Result<Self, RegistryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| RegistryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_fetch_attempts,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RegistryError> {
        conn.execute_batch(
            r#"
            -- One row per unique normalized source URL.
            CREATE TABLE IF NOT EXISTS registry (
                id TEXT PRIMARY KEY,
                source_url TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                storage_path TEXT,
                http_code INTEGER,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_attempt_at TEXT,
                is_valid INTEGER,
                confidence REAL,
                score_category REAL,
                score_product REAL,
                score_watermark REAL,
                score_placeholder REAL,
                score_quality REAL
            );

            CREATE INDEX IF NOT EXISTS idx_registry_status ON registry(status);
            "#,
        )
        .map_err(|e| RegistryError::Database(e.to_string()))?;

        Ok(())
    }

    /// Apply a fetch record to an existing entry.
    ///
    /// Shared by the single-entry operation and the chunk transaction.
    fn apply_fetch(
        conn: &Connection,
        id: &str,
        record: &FetchRecord,
    ) -> Result<(), RegistryError> {
        let current = Self::load_status(conn, id)?.ok_or_else(|| {
            RegistryError::NotFound(id.to_string())
        })?;

        // Forward-only: a validation verdict is never downgraded by a
        // replayed fetch commit.
        if matches!(
            current,
            EntryStatus::Validated | EntryStatus::ValidationFailed
        ) {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        match record {
            FetchRecord::Fetched {
                http_code,
                storage_path,
                from_cache,
            } => {
                let attempt_delta: u32 = if *from_cache { 0 } else { 1 };
                conn.execute(
                    "UPDATE registry
                     SET status = 'FETCHED', storage_path = ?, http_code = ?,
                         attempts = attempts + ?, last_attempt_at = ?
                     WHERE id = ?",
                    params![
                        storage_path,
                        http_code.map(|c| c as i64),
                        attempt_delta,
                        &now,
                        id
                    ],
                )
                .map_err(|e| RegistryError::Database(e.to_string()))?;
            }
            FetchRecord::Failed { http_code } => {
                conn.execute(
                    "UPDATE registry
                     SET status = 'FETCH_FAILED', http_code = ?,
                         attempts = attempts + 1, last_attempt_at = ?
                     WHERE id = ?",
                    params![http_code.map(|c| c as i64), &now, id],
                )
                .map_err(|e| RegistryError::Database(e.to_string()))?;
            }
        }

        Ok(())
    }

    /// Apply a validation verdict to an existing entry.
    fn apply_validation(
        conn: &Connection,
        id: &str,
        outcome: &ValidationOutcome,
    ) -> Result<(), RegistryError> {
        let current = Self::load_status(conn, id)?.ok_or_else(|| {
            RegistryError::NotFound(id.to_string())
        })?;

        if matches!(
            current,
            EntryStatus::Validated | EntryStatus::ValidationFailed
        ) {
            return Ok(());
        }

        let status = if outcome.is_valid {
            EntryStatus::Validated
        } else {
            EntryStatus::ValidationFailed
        };

        conn.execute(
            "UPDATE registry
             SET status = ?, is_valid = ?, confidence = ?,
                 score_category = ?, score_product = ?, score_watermark = ?,
                 score_placeholder = ?, score_quality = ?
             WHERE id = ?",
            params![
                status.as_str(),
                outcome.is_valid,
                outcome.confidence,
                outcome.detections.category_match,
                outcome.detections.product_match,
                outcome.detections.watermark_text,
                outcome.detections.placeholder_or_error,
                outcome.detections.low_quality,
                id
            ],
        )
        .map_err(|e| RegistryError::Database(e.to_string()))?;

        Ok(())
    }

    fn load_status(conn: &Connection, id: &str) -> Result<Option<EntryStatus>, RegistryError> {
        let status: Option<String> = conn
            .query_row("SELECT status FROM registry WHERE id = ?", params![id], |r| {
                r.get(0)
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                _ => Err(RegistryError::Database(e.to_string())),
            })?;

        match status {
            None => Ok(None),
            Some(s) => EntryStatus::parse(&s)
                .map(Some)
                .ok_or_else(|| RegistryError::Database(format!("corrupt status value: {}", s))),
        }
    }

    fn insert_pending(conn: &Connection, id: &str, url: &str) -> Result<(), RegistryError> {
        conn.execute(
            "INSERT OR IGNORE INTO registry (id, source_url, status, attempts)
             VALUES (?, ?, 'PENDING', 0)",
            params![id, url],
        )
        .map_err(|e| RegistryError::Database(e.to_string()))?;
        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<RegistryEntry> {
        let status_str: String = row.get(2)?;
        let status = EntryStatus::parse(&status_str).unwrap_or(EntryStatus::Pending);

        let last_attempt_str: Option<String> = row.get(6)?;
        let last_attempt_at = last_attempt_str.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        let is_valid: Option<bool> = row.get(7)?;
        let validation = match (status, is_valid) {
            (EntryStatus::Validated | EntryStatus::ValidationFailed, Some(is_valid)) => {
                Some(ValidationOutcome {
                    is_valid,
                    confidence: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
                    detections: DetectorScores {
                        category_match: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
                        product_match: row.get::<_, Option<f64>>(10)?.unwrap_or(0.0),
                        watermark_text: row.get::<_, Option<f64>>(11)?.unwrap_or(0.0),
                        placeholder_or_error: row.get::<_, Option<f64>>(12)?.unwrap_or(0.0),
                        low_quality: row.get::<_, Option<f64>>(13)?.unwrap_or(0.0),
                    },
                })
            }
            _ => None,
        };

        Ok(RegistryEntry {
            id: row.get(0)?,
            source_url: row.get(1)?,
            status,
            storage_path: row.get(3)?,
            http_code: row.get::<_, Option<i64>>(4)?.map(|c| c as u16),
            attempts: row.get::<_, i64>(5)? as u32,
            last_attempt_at,
            validation,
        })
    }

    fn resolved_for(&self, entry: &RegistryEntry, stage: Stage) -> bool {
        match stage {
            Stage::Fetch => match entry.status {
                EntryStatus::Fetched
                | EntryStatus::Validated
                | EntryStatus::ValidationFailed => true,
                EntryStatus::FetchFailed => {
                    self.max_fetch_attempts > 0 && entry.attempts >= self.max_fetch_attempts
                }
                EntryStatus::Pending => false,
            },
            Stage::Validate => matches!(
                entry.status,
                EntryStatus::Validated | EntryStatus::ValidationFailed
            ),
        }
    }
}

impl Registry for SqliteRegistry {
    fn lookup(&self, id: &str) -> Result<Option<RegistryEntry>, RegistryError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, source_url, status, storage_path, http_code, attempts,
                    last_attempt_at, is_valid, confidence, score_category,
                    score_product, score_watermark, score_placeholder, score_quality
             FROM registry WHERE id = ?",
            params![id],
            Self::row_to_entry,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            _ => Err(RegistryError::Database(e.to_string())),
        })
    }

    fn upsert_pending(&self, id: &str, url: &str) -> Result<(), RegistryError> {
        let conn = self.conn.lock().unwrap();
        Self::insert_pending(&conn, id, url)
    }

    fn mark_fetch_result(&self, id: &str, record: &FetchRecord) -> Result<(), RegistryError> {
        let conn = self.conn.lock().unwrap();
        Self::apply_fetch(&conn, id, record)
    }

    fn mark_validation_result(
        &self,
        id: &str,
        outcome: &ValidationOutcome,
    ) -> Result<(), RegistryError> {
        let conn = self.conn.lock().unwrap();
        Self::apply_validation(&conn, id, outcome)
    }

    fn is_resolved(&self, id: &str, stage: Stage) -> Result<bool, RegistryError> {
        match self.lookup(id)? {
            Some(entry) => Ok(self.resolved_for(&entry, stage)),
            None => Ok(false),
        }
    }

    fn commit_fetch_chunk(&self, commits: &[FetchCommit]) -> Result<(), RegistryError> {
        if commits.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| RegistryError::Database(e.to_string()))?;

        for commit in commits {
            Self::insert_pending(&tx, &commit.id, &commit.url)?;
            Self::apply_fetch(&tx, &commit.id, &commit.record)?;
        }

        tx.commit()
            .map_err(|e| RegistryError::Database(e.to_string()))?;
        Ok(())
    }

    fn commit_validation_chunk(
        &self,
        commits: &[(String, ValidationOutcome)],
    ) -> Result<(), RegistryError> {
        if commits.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| RegistryError::Database(e.to_string()))?;

        for (id, outcome) in commits {
            Self::apply_validation(&tx, id, outcome)?;
        }

        tx.commit()
            .map_err(|e| RegistryError::Database(e.to_string()))?;
        Ok(())
    }

    fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let conn = self.conn.lock().unwrap();

        let mut stats = RegistryStats::default();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM registry GROUP BY status")
            .map_err(|e| RegistryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| RegistryError::Database(e.to_string()))?;

        for row in rows {
            let (status, count) = row.map_err(|e| RegistryError::Database(e.to_string()))?;
            stats.total += count;
            match EntryStatus::parse(&status) {
                Some(EntryStatus::Pending) => stats.pending = count,
                Some(EntryStatus::Fetched) => stats.fetched = count,
                Some(EntryStatus::FetchFailed) => stats.fetch_failed = count,
                Some(EntryStatus::Validated) => stats.validated = count,
                Some(EntryStatus::ValidationFailed) => stats.validation_failed = count,
                None => {}
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_registry() -> SqliteRegistry {
        SqliteRegistry::in_memory(0).unwrap()
    }

    fn fetched_record(path: &str) -> FetchRecord {
        FetchRecord::Fetched {
            http_code: Some(200),
            storage_path: path.to_string(),
            from_cache: false,
        }
    }

    fn valid_outcome(confidence: f64) -> ValidationOutcome {
        ValidationOutcome {
            is_valid: true,
            confidence,
            detections: DetectorScores {
                category_match: 0.9,
                product_match: 0.8,
                watermark_text: 0.1,
                placeholder_or_error: 0.05,
                low_quality: 0.1,
            },
        }
    }

    #[test]
    fn test_upsert_pending_creates_entry() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.source_url, "https://example.com/a.jpg");
        assert_eq!(entry.attempts, 0);
        assert!(entry.storage_path.is_none());
        assert!(entry.validation.is_none());
    }

    #[test]
    fn test_upsert_pending_is_idempotent() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();

        // Second upsert must not reset the entry.
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Fetched);

        let stats = registry.stats().unwrap();
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn test_mark_fetch_success() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Fetched);
        assert_eq!(entry.storage_path.as_deref(), Some("ab/cd/abc.jpg"));
        assert_eq!(entry.http_code, Some(200));
        assert_eq!(entry.attempts, 1);
        assert!(entry.last_attempt_at.is_some());
    }

    #[test]
    fn test_mark_fetch_failure_increments_attempts() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();

        registry
            .mark_fetch_result("abc", &FetchRecord::Failed { http_code: None })
            .unwrap();
        registry
            .mark_fetch_result("abc", &FetchRecord::Failed {
                http_code: Some(503),
            })
            .unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::FetchFailed);
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.http_code, Some(503));
        assert!(entry.storage_path.is_none());
    }

    #[test]
    fn test_cache_hit_does_not_count_attempt() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result(
                "abc",
                &FetchRecord::Fetched {
                    http_code: None,
                    storage_path: "ab/cd/abc.jpg".to_string(),
                    from_cache: true,
                },
            )
            .unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Fetched);
        assert_eq!(entry.attempts, 0);
    }

    #[test]
    fn test_mark_fetch_unknown_id_fails() {
        let registry = create_test_registry();
        let result = registry.mark_fetch_result("missing", &fetched_record("x"));
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_mark_validation_unknown_id_fails() {
        let registry = create_test_registry();
        let result = registry.mark_validation_result("missing", &valid_outcome(0.9));
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_validation_sets_fields() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();
        registry
            .mark_validation_result("abc", &valid_outcome(0.92))
            .unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Validated);
        let validation = entry.validation.unwrap();
        assert!(validation.is_valid);
        assert!((validation.confidence - 0.92).abs() < f64::EPSILON);
        assert!((validation.detections.category_match - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejected_validation_sets_failed_status() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();

        let outcome = ValidationOutcome {
            is_valid: false,
            confidence: 0.3,
            detections: DetectorScores::default(),
        };
        registry.mark_validation_result("abc", &outcome).unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::ValidationFailed);
        assert!(entry.validation.is_some());
    }

    #[test]
    fn test_fetch_replay_never_downgrades_verdict() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();
        registry
            .mark_validation_result("abc", &valid_outcome(0.9))
            .unwrap();

        // Replayed fetch commit after a crash must not touch the verdict.
        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();

        let entry = registry.lookup("abc").unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Validated);
    }

    #[test]
    fn test_is_resolved_fetch() {
        let registry = create_test_registry();
        assert!(!registry.is_resolved("missing", Stage::Fetch).unwrap());

        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        assert!(!registry.is_resolved("abc", Stage::Fetch).unwrap());

        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();
        assert!(registry.is_resolved("abc", Stage::Fetch).unwrap());
        assert!(!registry.is_resolved("abc", Stage::Validate).unwrap());
    }

    #[test]
    fn test_failed_fetch_unresolved_without_cap() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result("abc", &FetchRecord::Failed { http_code: None })
            .unwrap();

        // No cap configured: always retryable on a later run.
        assert!(!registry.is_resolved("abc", Stage::Fetch).unwrap());
    }

    #[test]
    fn test_failed_fetch_resolves_at_attempt_cap() {
        let registry = SqliteRegistry::in_memory(2).unwrap();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();

        registry
            .mark_fetch_result("abc", &FetchRecord::Failed { http_code: None })
            .unwrap();
        assert!(!registry.is_resolved("abc", Stage::Fetch).unwrap());

        registry
            .mark_fetch_result("abc", &FetchRecord::Failed { http_code: None })
            .unwrap();
        assert!(registry.is_resolved("abc", Stage::Fetch).unwrap());
    }

    #[test]
    fn test_is_resolved_validate() {
        let registry = create_test_registry();
        registry
            .upsert_pending("abc", "https://example.com/a.jpg")
            .unwrap();
        registry
            .mark_fetch_result("abc", &fetched_record("ab/cd/abc.jpg"))
            .unwrap();
        assert!(!registry.is_resolved("abc", Stage::Validate).unwrap());

        let outcome = ValidationOutcome {
            is_valid: false,
            confidence: 0.2,
            detections: DetectorScores::default(),
        };
        registry.mark_validation_result("abc", &outcome).unwrap();

        // A delivered verdict is terminal either way.
        assert!(registry.is_resolved("abc", Stage::Validate).unwrap());
    }

    #[test]
    fn test_commit_fetch_chunk_creates_and_marks() {
        let registry = create_test_registry();
        let commits = vec![
            FetchCommit {
                id: "a".to_string(),
                url: "https://example.com/a.jpg".to_string(),
                record: fetched_record("aa/bb/a.jpg"),
            },
            FetchCommit {
                id: "b".to_string(),
                url: "https://example.com/b.jpg".to_string(),
                record: FetchRecord::Failed {
                    http_code: Some(404),
                },
            },
        ];

        registry.commit_fetch_chunk(&commits).unwrap();

        assert_eq!(
            registry.lookup("a").unwrap().unwrap().status,
            EntryStatus::Fetched
        );
        let b = registry.lookup("b").unwrap().unwrap();
        assert_eq!(b.status, EntryStatus::FetchFailed);
        assert_eq!(b.attempts, 1);
    }

    #[test]
    fn test_commit_validation_chunk() {
        let registry = create_test_registry();
        for id in ["a", "b"] {
            registry
                .upsert_pending(id, &format!("https://example.com/{}.jpg", id))
                .unwrap();
            registry
                .mark_fetch_result(id, &fetched_record("aa/bb/x.jpg"))
                .unwrap();
        }

        let commits = vec![
            ("a".to_string(), valid_outcome(0.9)),
            (
                "b".to_string(),
                ValidationOutcome {
                    is_valid: false,
                    confidence: 0.1,
                    detections: DetectorScores::default(),
                },
            ),
        ];
        registry.commit_validation_chunk(&commits).unwrap();

        assert_eq!(
            registry.lookup("a").unwrap().unwrap().status,
            EntryStatus::Validated
        );
        assert_eq!(
            registry.lookup("b").unwrap().unwrap().status,
            EntryStatus::ValidationFailed
        );
    }

    #[test]
    fn test_stats_counts_by_status() {
        let registry = create_test_registry();
        registry
            .upsert_pending("a", "https://example.com/a.jpg")
            .unwrap();
        registry
            .upsert_pending("b", "https://example.com/b.jpg")
            .unwrap();
        registry
            .mark_fetch_result("b", &fetched_record("bb/cc/b.jpg"))
            .unwrap();

        let stats = registry.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.validated, 0);
    }
}
