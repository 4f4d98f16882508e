//! Parallel batch driver
//!
//! One unit of work per file, scheduled on a bounded rayon pool. The
//! mapping table and analyzer are shared read-only; the only shared mutable
//! state is the [`Accumulator`] behind a `parking_lot` mutex, updated once
//! per completed file.
//!
//! With `continue_on_error = false` the first failure raises a cancel flag.
//! Files already in flight finish (writes stay atomic); files not yet
//! started are counted as skipped and the result is marked aborted.

use crate::aggregate::{Accumulator, BatchKind, BatchResult, FileReport};
use crate::discovery::{Discovery, Project};
use crate::error::{BatchError, DriverResult};
use fqcn_core::{
    ConversionEngine, ConversionOptions, MappingTable, TaskAnalyzer, ValidationEngine,
    ValidationOptions,
};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 4;

/// Batch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Parallel workers (at least one is used)
    pub workers: usize,
    /// Keep going after a file fails
    pub continue_on_error: bool,
    /// Project marker patterns; empty means the defaults
    pub include: Vec<String>,
    /// Extra exclude patterns
    pub exclude: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            continue_on_error: true,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl BatchConfig {
    /// Set worker count
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set failure policy
    #[inline]
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Operation applied to every file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchMode {
    /// Rewrite module keys
    Convert(ConversionOptions),
    /// Score compliance
    Validate(ValidationOptions),
}

impl BatchMode {
    fn kind(&self) -> BatchKind {
        match self {
            Self::Convert(_) => BatchKind::Convert,
            Self::Validate(_) => BatchKind::Validate,
        }
    }

    fn dry_run(&self) -> bool {
        match self {
            Self::Convert(options) => options.dry_run,
            Self::Validate(_) => true,
        }
    }
}

/// Engine for one mode, shared by all workers
enum Worker {
    Convert(ConversionEngine),
    Validate(ValidationEngine),
}

impl Worker {
    fn new(analyzer: &TaskAnalyzer, mode: &BatchMode) -> Self {
        match mode {
            BatchMode::Convert(options) => {
                Self::Convert(ConversionEngine::new(analyzer.clone(), options.clone()))
            }
            BatchMode::Validate(options) => {
                Self::Validate(ValidationEngine::new(analyzer.clone(), *options))
            }
        }
    }

    fn process(&self, path: &Path, table: &MappingTable) -> FileReport {
        match self {
            Self::Convert(engine) => FileReport::Conversion(engine.convert_file(path, table)),
            Self::Validate(engine) => FileReport::Validation(engine.validate_file(path, table)),
        }
    }
}

/// Applies an engine across many projects
#[derive(Debug, Clone)]
pub struct BatchDriver<'a> {
    table: &'a MappingTable,
    analyzer: TaskAnalyzer,
    config: BatchConfig,
}

impl<'a> BatchDriver<'a> {
    /// Create driver
    #[inline]
    #[must_use]
    pub fn new(table: &'a MappingTable, analyzer: TaskAnalyzer, config: BatchConfig) -> Self {
        Self {
            table,
            analyzer,
            config,
        }
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Discover projects under `root` with the configured patterns
    ///
    /// # Errors
    /// See [`Discovery::projects`]
    pub fn discover(&self, root: &Path) -> DriverResult<Vec<Project>> {
        Discovery::new(&self.config.include, &self.config.exclude)?.projects(root)
    }

    /// Process every file of every project
    ///
    /// Per-file failures are recorded in the result, never returned.
    ///
    /// # Errors
    /// `BatchError::Pool` if the worker pool cannot be started
    pub fn run(&self, projects: &[Project], mode: &BatchMode) -> DriverResult<BatchResult> {
        let started = Instant::now();
        let workers = self.config.workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fqcn-worker-{i}"))
            .build()
            .map_err(|e| BatchError::Pool(e.to_string()))?;

        let units: Vec<(usize, &Path)> = projects
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.files.iter().map(move |f| (i, f.as_path())))
            .collect();

        tracing::info!(
            projects = projects.len(),
            files = units.len(),
            workers,
            kind = ?mode.kind(),
            dry_run = mode.dry_run(),
            "batch started"
        );

        let worker = Worker::new(&self.analyzer, mode);
        let cancelled = AtomicBool::new(false);
        let accumulator = Mutex::new(Accumulator::new(projects.len()));
        let continue_on_error = self.config.continue_on_error;

        pool.install(|| {
            units.par_iter().for_each(|&(project, path)| {
                if cancelled.load(Ordering::Acquire) {
                    accumulator.lock().skip(project);
                    return;
                }
                let report = worker.process(path, self.table);
                if !report.is_success() && !continue_on_error {
                    tracing::warn!(path = %path.display(), "cancelling remaining work");
                    cancelled.store(true, Ordering::Release);
                }
                accumulator.lock().record(project, report);
            });
        });

        let aborted = cancelled.load(Ordering::Acquire);
        let roots: Vec<PathBuf> = projects.iter().map(|p| p.root.clone()).collect();
        let result = accumulator.into_inner().finish(
            &roots,
            mode.kind(),
            mode.dry_run(),
            workers,
            aborted,
            started.elapsed(),
        );

        tracing::info!(
            run_id = %result.run_id,
            processed = result.totals.files_processed,
            failed = result.totals.failed,
            skipped = result.totals.skipped,
            changes = result.totals.changes_made,
            aborted,
            "batch finished"
        );
        Ok(result)
    }

    /// Discover then run
    ///
    /// # Errors
    /// See [`BatchDriver::discover`] and [`BatchDriver::run`]
    pub fn run_dir(&self, root: &Path, mode: &BatchMode) -> DriverResult<BatchResult> {
        let projects = self.discover(root)?;
        self.run(&projects, mode)
    }
}
