//! FQCN Core - module name conversion and validation
//!
//! The engine that:
//! - Parses task documents into blocks while keeping the original text
//! - Identifies the one module-invocation key of each task
//! - Rewrites short module names to fully-qualified names in place
//! - Scores documents for compliance
//!
//! # Example
//!
//! ```rust
//! use fqcn_core::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = MappingTable::from_pairs([("user", "ns.col.user"), ("group", "ns.col.group")]);
//! let keywords = ControlKeywordSet::builtin();
//! let doc = Document::parse(
//!     "tasks/main.yml",
//!     "- name: Add user\n  user:\n    name: johnd\n    group: admin\n",
//!     &keywords,
//! )?;
//!
//! let result = ConversionEngine::default().convert(&doc, &table);
//! assert_eq!(result.changes_made, 1);
//! assert!(result.after_text.contains("ns.col.user:"));
//! assert!(result.after_text.contains("group: admin"));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod analyzer;
pub mod convert;
pub mod document;
pub mod error;
pub mod keywords;
pub mod mapping;
pub mod report;
pub mod validate;

// Re-exports for convenience
pub use analyzer::{AnalyzerNote, AnalyzerPolicy, Classification, NoteKind, TaskAnalyzer, TieBreak};
pub use convert::{
    write_atomic, ConversionEngine, ConversionOptions, ConversionResult, KeyChange,
    DEFAULT_BACKUP_SUFFIX,
};
pub use document::{
    Anomaly, Block, BlockKind, Document, Entry, FileRole, KeyLocation, Node, NodePath, OutlineGap,
    Scalar, Segment, Shape,
};
pub use error::{ConversionError, FqcnError, FqcnResult, MappingError, ParseError, ReportError};
pub use keywords::{ControlKeywordSet, KEYWORD_SET_VERSION};
pub use mapping::{
    is_fully_qualified, MappingEntry, MappingSource, MappingTable, MappingTableBuilder,
    MappingWarning,
};
pub use report::{ReportFormat, TextReport};
pub use validate::{
    compliance_score, Severity, ValidationEngine, ValidationIssue, ValidationOptions,
    ValidationResult,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with FQCN Core
    pub use crate::{
        ControlKeywordSet, ConversionEngine, ConversionOptions, ConversionResult, Document,
        MappingTable, MappingTableBuilder, ReportFormat, TaskAnalyzer, ValidationEngine,
        ValidationOptions, ValidationResult,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
