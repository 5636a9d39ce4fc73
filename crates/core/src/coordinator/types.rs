//! Coordinator types: stage areas and the per-batch state machine.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Per-batch state machine.
///
/// The resting state of a batch is derived from the area its file sits in;
/// the coordinator alone performs transitions. `Done` batches rest in the
/// `validated` area until the archive sweep relocates them (a housekeeping
/// move, not a state change).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    PendingFetch,
    Fetched,
    PendingClassify,
    Classified,
    PendingValidate,
    Done,
}

impl BatchState {
    pub fn name(&self) -> &'static str {
        match self {
            BatchState::PendingFetch => "pending_fetch",
            BatchState::Fetched => "fetched",
            BatchState::PendingClassify => "pending_classify",
            BatchState::Classified => "classified",
            BatchState::PendingValidate => "pending_validate",
            BatchState::Done => "done",
        }
    }

    /// The next state, or `None` from the terminal state.
    pub fn advance(&self) -> Option<BatchState> {
        match self {
            BatchState::PendingFetch => Some(BatchState::Fetched),
            BatchState::Fetched => Some(BatchState::PendingClassify),
            BatchState::PendingClassify => Some(BatchState::Classified),
            BatchState::Classified => Some(BatchState::PendingValidate),
            BatchState::PendingValidate => Some(BatchState::Done),
            BatchState::Done => None,
        }
    }
}

/// The stage areas under one data root.
///
/// Flow: `inbox` -> `fetched` -> `classified` -> `validated` -> `archive`.
#[derive(Debug, Clone)]
pub struct StageAreas {
    pub inbox: PathBuf,
    pub fetched: PathBuf,
    pub classified: PathBuf,
    pub validated: PathBuf,
    pub archive: PathBuf,
}

impl StageAreas {
    pub fn new(root: &Path) -> Self {
        Self {
            inbox: root.join("inbox"),
            fetched: root.join("fetched"),
            classified: root.join("classified"),
            validated: root.join("validated"),
            archive: root.join("archive"),
        }
    }

    /// The area a batch in the given resting state sits in.
    pub fn area_for(&self, state: BatchState) -> &Path {
        match state {
            BatchState::PendingFetch => &self.inbox,
            BatchState::Fetched | BatchState::PendingClassify => &self.fetched,
            BatchState::Classified | BatchState::PendingValidate => &self.classified,
            BatchState::Done => &self.validated,
        }
    }

    /// All areas, for directory bootstrapping.
    pub fn all(&self) -> [&Path; 5] {
        [
            &self.inbox,
            &self.fetched,
            &self.classified,
            &self.validated,
            &self.archive,
        ]
    }

    /// Create every area directory.
    pub async fn ensure(&self) -> std::io::Result<()> {
        for area in self.all() {
            tokio::fs::create_dir_all(area).await?;
        }
        Ok(())
    }
}

/// Batch counts for one coordinator cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub batches_fetched: u64,
    pub batches_classified: u64,
    pub batches_validated: u64,
    pub batches_archived: u64,
}

impl CycleStats {
    /// Whether the cycle found nothing to do - the steady state for a
    /// long-running service, not an error.
    pub fn is_idle(&self) -> bool {
        self.batches_fetched == 0
            && self.batches_classified == 0
            && self.batches_validated == 0
            && self.batches_archived == 0
    }
}
