//! Batch files - delimited product rows relocated wholesale between stages.
//!
//! A batch is one input file representing a unit of pipeline work. Only the
//! fields the pipeline needs are modeled (title, description, body,
//! attributes, image references, category); any further column semantics
//! are the producer's business and pass through untouched.

mod rows;

pub use rows::*;

/// Error type for batch file operations.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Required column missing from the batch header.
    #[error("Batch file missing required column: {0}")]
    MissingColumn(String),

    /// Malformed delimited content.
    #[error("Batch parse error: {0}")]
    Parse(String),

    /// Filesystem error.
    #[error("Batch I/O error: {0}")]
    Io(#[from] std::io::Error),
}
