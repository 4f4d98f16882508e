//! FQCN Batch - parallel conversion across many projects
//!
//! Provides:
//! - Project discovery with include/exclude patterns and nested-project de-duplication
//! - A bounded worker pool with cancellation on first failure
//! - Order-independent aggregation into a [`BatchResult`]
//!
//! # Example
//!
//! ```rust,no_run
//! use fqcn_batch::{BatchConfig, BatchDriver, BatchMode};
//! use fqcn_core::{ConversionOptions, MappingTable, TaskAnalyzer};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = MappingTable::builtin()?;
//! let driver = BatchDriver::new(&table, TaskAnalyzer::new(), BatchConfig::default());
//! let result = driver.run_dir(
//!     Path::new("./automation"),
//!     &BatchMode::Convert(ConversionOptions::dry_run()),
//! )?;
//! println!("{} change(s), {} failure(s)", result.totals.changes_made, result.failed_conversions());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregate;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod report;

pub use aggregate::{BatchKind, BatchResult, FileReport, ProjectSummary, Totals};
pub use discovery::{discover, is_eligible, Discovery, Project, DEFAULT_EXCLUDES, DEFAULT_PROJECT_MARKERS};
pub use driver::{BatchConfig, BatchDriver, BatchMode, DEFAULT_WORKERS};
pub use error::{BatchError, DriverResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
