//! Error types for deduplication runs.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DedupError>;

/// Error type for deduplication runs.
#[derive(Error, Debug)]
pub enum DedupError {
    /// A required path is missing, unreadable or conflicts with another path.
    #[error("Invalid path '{}': {reason}", path.display())]
    Config {
        /// The offending path
        path: PathBuf,
        /// Explanation of the problem
        reason: String,
    },

    /// A data line that cannot be parsed into an alignment record.
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based input line number (0 when parsed outside a stream)
        line: u64,
        /// Explanation of the problem
        reason: String,
    },

    /// Input that is not grouped by chromosome and sorted by position.
    #[error("Input is not coordinate-sorted at line {line}: {reason}")]
    UnsortedInput {
        /// 1-based input line number
        line: u64,
        /// Explanation of the problem
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DedupError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord { line: 0, reason: reason.into() }
    }

    /// Attach an input line number to a record-level error.
    #[must_use]
    pub fn at_line(self, line: u64) -> Self {
        match self {
            Self::MalformedRecord { reason, .. } => Self::MalformedRecord { line, reason },
            Self::UnsortedInput { reason, .. } => Self::UnsortedInput { line, reason },
            other => other,
        }
    }

    /// True for errors that describe a single bad data line.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}
