//! Error types for the conversion engine
//!
//! Provides error handling for:
//! - Parse operations (text → Document)
//! - Mapping table loading (file → MappingTable)
//! - Conversion operations (rewrite, backup, atomic write)
//! - Report rendering (text, JSON, YAML)

use std::path::PathBuf;

/// Errors while turning source text into a [`Document`](crate::document::Document)
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Syntax error in source file
    #[error("syntax error in {path}: {message}")]
    SyntaxError { path: PathBuf, message: String },

    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Part of a document uses a YAML construct that cannot be edited in place
    #[error("unsupported document shape in {path}: {reason}")]
    UnsupportedShape { path: PathBuf, reason: String },
}

impl ParseError {
    /// Create syntax error for path
    pub fn syntax_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SyntaxError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create unsupported shape error for path
    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedShape {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors while loading mapping tables
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// Mapping file could not be read
    #[error("io error reading mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mapping file is not a `short: fully.qualified.name` document
    #[error("malformed mapping file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// Single entry rejected
    #[error("invalid mapping entry '{short}' -> '{target}': {reason}")]
    InvalidEntry {
        short: String,
        target: String,
        reason: String,
    },

    /// Built-in defaults failed to load
    #[error("built-in mapping defaults are unusable: {0}")]
    Defaults(String),
}

impl MappingError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create malformed file error
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create invalid entry error
    pub fn invalid_entry(
        short: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidEntry {
            short: short.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Errors while producing or persisting converted output
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Pre-image could not be preserved
    #[error("failed to write backup {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Post-image could not be written
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rewritten text no longer matches the expected structure
    #[error("internal invariant violated in {path}: {message}")]
    InvariantViolation { path: PathBuf, message: String },
}

impl ConversionError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create backup error for path
    pub fn backup_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Backup {
            path: path.into(),
            source,
        }
    }

    /// Create invariant violation for path
    pub fn invariant(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors while rendering reports
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// JSON serialization failed
    #[error("failed to render json report: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization failed
    #[error("failed to render yaml report: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Unknown format name
    #[error("unknown report format '{0}' (expected text, json or yaml)")]
    UnknownFormat(String),
}

/// Combined engine error
#[derive(Debug, thiserror::Error)]
pub enum FqcnError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// Result type alias for engine operations
pub type FqcnResult<T> = Result<T, FqcnError>;
