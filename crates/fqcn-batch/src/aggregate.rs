//! Batch aggregation
//!
//! Totals are plain integer counters merged by addition, so folding the
//! same per-file results in any order, on any number of workers, yields
//! identical totals. Ratios are derived from the counters on demand.

use chrono::{DateTime, Utc};
use fqcn_core::{compliance_score, ConversionResult, ValidationResult};
use serde::Serialize;
use std::ops::{Add, AddAssign};
use std::path::PathBuf;
use std::time::Duration;
use ulid::Ulid;

/// Additive counters for a set of files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Totals {
    /// Files handed to a worker
    pub files_processed: usize,
    /// Files processed without error
    pub successful: usize,
    /// Files that failed (parse, io, invariant)
    pub failed: usize,
    /// Files not started because the run was cancelled
    pub skipped: usize,
    /// Files that validated as non-compliant
    pub invalid: usize,
    /// Module keys rewritten (or that would be, in a dry run)
    pub changes_made: usize,
    /// Module invocations counted by validation
    pub total_modules: usize,
    /// Invocations already fully qualified
    pub already_qualified: usize,
    /// Invocations with a known replacement
    pub still_short: usize,
    /// Invocations with no known replacement
    pub unknown_modules: usize,
    /// Warnings and issues reported
    pub warnings: usize,
}

impl Totals {
    /// Counters for one conversion
    #[must_use]
    pub fn from_conversion(result: &ConversionResult) -> Self {
        Self {
            files_processed: 1,
            successful: usize::from(result.success),
            failed: usize::from(!result.success),
            changes_made: result.changes_made,
            warnings: result.warnings.len(),
            ..Self::default()
        }
    }

    /// Counters for one validation
    #[must_use]
    pub fn from_validation(result: &ValidationResult) -> Self {
        let success = result.is_success();
        Self {
            files_processed: 1,
            successful: usize::from(success),
            failed: usize::from(!success),
            invalid: usize::from(success && !result.valid),
            total_modules: result.total_modules,
            already_qualified: result.already_qualified,
            still_short: result.still_short,
            unknown_modules: result.unknown_modules,
            warnings: result.issues.len(),
            ..Self::default()
        }
    }

    /// Counters for one skipped file
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            skipped: 1,
            ..Self::default()
        }
    }

    /// `successful / (successful + failed)`, `1.0` when nothing ran
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let ran = self.successful + self.failed;
        if ran == 0 {
            1.0
        } else {
            self.successful as f64 / ran as f64
        }
    }

    /// Compliance over all counted invocations
    #[inline]
    #[must_use]
    pub fn compliance_score(&self) -> f64 {
        compliance_score(self.already_qualified, self.total_modules)
    }
}

impl Add for Totals {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Self) {
        self.files_processed += rhs.files_processed;
        self.successful += rhs.successful;
        self.failed += rhs.failed;
        self.skipped += rhs.skipped;
        self.invalid += rhs.invalid;
        self.changes_made += rhs.changes_made;
        self.total_modules += rhs.total_modules;
        self.already_qualified += rhs.already_qualified;
        self.still_short += rhs.still_short;
        self.unknown_modules += rhs.unknown_modules;
        self.warnings += rhs.warnings;
    }
}

impl std::iter::Sum for Totals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Per-file record kept in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileReport {
    /// Conversion outcome
    Conversion(ConversionResult),
    /// Validation outcome
    Validation(ValidationResult),
}

impl FileReport {
    /// File the record is about
    #[must_use]
    pub fn file_path(&self) -> &std::path::Path {
        match self {
            Self::Conversion(r) => &r.file_path,
            Self::Validation(r) => &r.file_path,
        }
    }

    /// Whether the file was processed without error
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::Conversion(r) => r.success,
            Self::Validation(r) => r.is_success(),
        }
    }

    /// Counters contributed by this record
    #[must_use]
    pub fn totals(&self) -> Totals {
        match self {
            Self::Conversion(r) => Totals::from_conversion(r),
            Self::Validation(r) => Totals::from_validation(r),
        }
    }
}

/// Per-project rollup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    /// Project root
    pub path: PathBuf,
    /// Counters for the project's files
    pub totals: Totals,
    /// Whether every processed file succeeded
    pub success: bool,
    /// Compliance over the project's invocations
    pub compliance_score: f64,
}

impl ProjectSummary {
    /// Summary from counters
    #[must_use]
    pub fn new(path: PathBuf, totals: Totals) -> Self {
        Self {
            path,
            success: totals.failed == 0,
            compliance_score: totals.compliance_score(),
            totals,
        }
    }
}

/// What a batch did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// Rewrote (or would rewrite) files
    Convert,
    /// Inspected files
    Validate,
}

/// Finalized outcome of a batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    /// Unique run id
    pub run_id: Ulid,
    /// Completion timestamp
    pub generated_at: DateTime<Utc>,
    /// Convert or validate
    pub kind: BatchKind,
    /// Whether nothing was written
    pub dry_run: bool,
    /// Workers used
    pub workers: usize,
    /// Set when the run was cancelled after a failure
    pub aborted: bool,
    /// Counters over all projects
    pub totals: Totals,
    /// Success ratio of processed files
    pub success_rate: f64,
    /// Compliance over all invocations
    pub compliance_score: f64,
    /// Per-project rollups in discovery order
    pub projects: Vec<ProjectSummary>,
    /// Per-file records sorted by project then path
    pub files: Vec<FileReport>,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl BatchResult {
    /// Number of files that failed
    #[inline]
    #[must_use]
    pub fn failed_conversions(&self) -> usize {
        self.totals.failed
    }

    /// Number of files that succeeded
    #[inline]
    #[must_use]
    pub fn successful_conversions(&self) -> usize {
        self.totals.successful
    }

    /// Whether every file succeeded and the run was not cancelled
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.aborted && self.totals.failed == 0
    }

    /// Whether every file also validated as compliant
    #[inline]
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.is_success() && self.totals.invalid == 0
    }

    /// Failed file records
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_success())
    }
}

/// Incremental accumulator shared by workers behind a lock
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    projects: Vec<Totals>,
    files: Vec<(usize, FileReport)>,
}

impl Accumulator {
    pub(crate) fn new(projects: usize) -> Self {
        Self {
            projects: vec![Totals::default(); projects],
            files: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, project: usize, report: FileReport) {
        if let Some(totals) = self.projects.get_mut(project) {
            *totals += report.totals();
        }
        self.files.push((project, report));
    }

    pub(crate) fn skip(&mut self, project: usize) {
        if let Some(totals) = self.projects.get_mut(project) {
            *totals += Totals::skipped();
        }
    }

    pub(crate) fn finish(
        mut self,
        roots: &[PathBuf],
        kind: BatchKind,
        dry_run: bool,
        workers: usize,
        aborted: bool,
        elapsed: Duration,
    ) -> BatchResult {
        self.files
            .sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| a.file_path().cmp(b.file_path())));
        let totals: Totals = self.projects.iter().copied().sum();
        let projects = roots
            .iter()
            .zip(self.projects)
            .map(|(root, totals)| ProjectSummary::new(root.clone(), totals))
            .collect();

        BatchResult {
            run_id: Ulid::new(),
            generated_at: Utc::now(),
            kind,
            dry_run,
            workers,
            aborted,
            success_rate: totals.success_rate(),
            compliance_score: totals.compliance_score(),
            totals,
            projects,
            files: self.files.into_iter().map(|(_, report)| report).collect(),
            elapsed,
        }
    }
}
