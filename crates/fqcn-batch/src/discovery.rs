//! Project discovery
//!
//! Walks a directory tree once, in sorted order, collecting eligible files
//! and marker entries together. A directory is a project when one of its
//! immediate children matches an include pattern (project markers such as
//! `roles/` or `site.yml`). The outermost marked directory claims its whole
//! subtree, so a role inside a project is never reported on its own, and
//! every eligible file belongs to the project whose root contains it.
//!
//! Exclude patterns prune directories and files. They are matched against
//! the path relative to the root and against the bare entry name.

use crate::error::{BatchError, DriverResult};
use fqcn_core::FileRole;
use glob::Pattern;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Entry names that mark a project root
pub const DEFAULT_PROJECT_MARKERS: &[&str] = &[
    "ansible.cfg",
    "site.yml",
    "site.yaml",
    "playbook*.yml",
    "playbook*.yaml",
    "roles",
    "playbooks",
    "tasks",
    "handlers",
];

/// Entries that are never searched
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".tox",
    ".venv",
    "venv",
    "node_modules",
    "__pycache__",
    "collections",
];

/// A discovered project and its eligible files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Project root directory
    pub root: PathBuf,
    /// Eligible documents, sorted
    pub files: Vec<PathBuf>,
}

impl Project {
    /// Project made of explicit files
    #[must_use]
    pub fn from_files(root: impl Into<PathBuf>, mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        Self {
            root: root.into(),
            files,
        }
    }
}

/// Compiled include/exclude rules
#[derive(Debug, Clone)]
pub struct Discovery {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Discovery {
    /// Compile rules; an empty include list means the default markers
    ///
    /// # Errors
    /// `BatchError::InvalidPattern` if a pattern does not compile
    pub fn new(include: &[String], exclude: &[String]) -> DriverResult<Self> {
        let include = if include.is_empty() {
            compile(DEFAULT_PROJECT_MARKERS.iter().copied())?
        } else {
            compile(include.iter().map(String::as_str))?
        };
        let exclude = compile(
            DEFAULT_EXCLUDES
                .iter()
                .copied()
                .chain(exclude.iter().map(String::as_str)),
        )?;
        Ok(Self { include, exclude })
    }

    /// Find project roots under `root`
    ///
    /// # Errors
    /// - `BatchError::NotADirectory` if `root` is not a directory
    /// - `BatchError::Walk` if the tree cannot be read
    pub fn projects(&self, root: &Path) -> DriverResult<Vec<Project>> {
        if !root.is_dir() {
            return Err(BatchError::NotADirectory(root.to_path_buf()));
        }

        let mut marked: BTreeSet<PathBuf> = BTreeSet::new();
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(root, e));
        for entry in walker {
            let entry = entry.map_err(|e| BatchError::walk_error(root, e))?;
            if entry.depth() > 0 && self.is_marker(&entry) {
                if let Some(parent) = entry.path().parent() {
                    marked.insert(parent.to_path_buf());
                }
            }
            if entry.file_type().is_file() && is_eligible(entry.path()) {
                files.push(entry.into_path());
            }
        }

        // ancestors sort before descendants, so the first claim is outermost
        let mut projects: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for dir in marked {
            if !projects.keys().any(|claimed| dir.starts_with(claimed)) {
                tracing::debug!(project = %dir.display(), "discovered project");
                projects.insert(dir, Vec::new());
            }
        }
        for file in files {
            let owner = projects
                .iter_mut()
                .find(|(project, _)| file.starts_with(project));
            if let Some((_, owned)) = owner {
                owned.push(file);
            }
        }

        Ok(projects
            .into_iter()
            .map(|(project, files)| Project::from_files(project, files))
            .collect())
    }

    /// Eligible documents under `dir`, sorted
    ///
    /// # Errors
    /// `BatchError::Walk` if the tree cannot be read
    pub fn files(&self, dir: &Path) -> DriverResult<Vec<PathBuf>> {
        self.files_under(dir, dir)
    }

    fn files_under(&self, root: &Path, dir: &Path) -> DriverResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(root, e));
        for entry in walker {
            let entry = entry.map_err(|e| BatchError::walk_error(dir, e))?;
            if entry.file_type().is_file() && is_eligible(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn is_marker(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.include.iter().any(|p| p.matches(&name))
    }

    fn is_excluded(&self, root: &Path, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        self.exclude
            .iter()
            .any(|p| p.matches(&name) || p.matches_path(relative))
    }
}

/// Find projects with the given include/exclude patterns
///
/// # Errors
/// See [`Discovery::new`] and [`Discovery::projects`]
pub fn discover(root: &Path, include: &[String], exclude: &[String]) -> DriverResult<Vec<Project>> {
    Discovery::new(include, exclude)?.projects(root)
}

/// YAML document that may hold tasks
#[must_use]
pub fn is_eligible(path: &Path) -> bool {
    let yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"));
    yaml && FileRole::from_path(path) == FileRole::Automation
}

fn compile<'a>(patterns: impl IntoIterator<Item = &'a str>) -> DriverResult<Vec<Pattern>> {
    patterns
        .into_iter()
        .map(|p| Pattern::new(p).map_err(|e| BatchError::invalid_pattern(p, e)))
        .collect()
}
