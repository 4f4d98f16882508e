//! Error types for the batch driver
//!
//! Per-file failures never surface here; they are recorded in the
//! per-file results. These errors stop a run before any file is touched.

use std::path::PathBuf;

/// Errors that prevent a batch from running
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Directory walk failed
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Root is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Include or exclude pattern does not compile
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Worker pool could not be created
    #[error("failed to start worker pool: {0}")]
    Pool(String),

    /// Report rendering failed
    #[error(transparent)]
    Report(#[from] fqcn_core::ReportError),
}

impl BatchError {
    /// Create walk error for path
    pub fn walk_error(path: impl Into<PathBuf>, source: walkdir::Error) -> Self {
        Self::Walk {
            path: path.into(),
            source,
        }
    }

    /// Create invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, source: glob::PatternError) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }
}

/// Result type alias for batch operations
pub type DriverResult<T> = Result<T, BatchError>;
