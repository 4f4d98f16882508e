//! Validation engine
//!
//! Measures how many module invocations of a document already use their
//! fully-qualified names. Never mutates anything.
//!
//! `score = already_qualified / max(1, total_modules)`; a document without
//! module invocations scores `1.0`.

use crate::analyzer::TaskAnalyzer;
use crate::document::{Block, Document};
use crate::error::ParseError;
use crate::mapping::{is_fully_qualified, MappingTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-compliant module usage or unreadable file
    Error,
    /// Ambiguous or malformed task
    Warning,
    /// Unknown module (strict mode)
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// 1-based line (0 when unknown)
    pub line: usize,
    /// 1-based column (0 when unknown)
    pub column: usize,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
    /// Suggested remediation
    pub suggestion: String,
    /// Module name involved, if any
    pub module_name: Option<String>,
    /// Fully-qualified name expected, if known
    pub expected_full_name: Option<String>,
}

/// Outcome of validating one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// File validated
    pub file_path: PathBuf,
    /// Whether the file is compliant
    pub valid: bool,
    /// Findings in document order
    pub issues: Vec<ValidationIssue>,
    /// Compliance score in `[0, 1]`
    pub score: f64,
    /// `already_qualified + still_short`
    pub total_modules: usize,
    /// Module keys already fully qualified
    pub already_qualified: usize,
    /// Module keys with a known fully-qualified replacement
    pub still_short: usize,
    /// Module keys neither qualified nor mapped
    pub unknown_modules: usize,
    /// Failures that prevented validation
    pub errors: Vec<String>,
    /// Wall time spent on the file
    pub elapsed: Duration,
}

impl ValidationResult {
    /// Whether the file could be analyzed
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Issues of one severity
    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    fn failed(file_path: PathBuf, error: &ParseError, started: Instant) -> Self {
        tracing::error!(path = %file_path.display(), error = %error, "validation failed");
        Self {
            file_path,
            valid: false,
            issues: vec![ValidationIssue {
                line: 0,
                column: 0,
                severity: Severity::Error,
                message: error.to_string(),
                suggestion: "fix the file so it parses as YAML".to_string(),
                module_name: None,
                expected_full_name: None,
            }],
            score: 0.0,
            total_modules: 0,
            already_qualified: 0,
            still_short: 0,
            unknown_modules: 0,
            errors: vec![error.to_string()],
            elapsed: started.elapsed(),
        }
    }
}

/// Compliance score from integer counters
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compliance_score(already_qualified: usize, total_modules: usize) -> f64 {
    if total_modules == 0 {
        1.0
    } else {
        already_qualified as f64 / total_modules as f64
    }
}

/// Validation settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Report unknown modules and fail on any issue
    pub strict: bool,
}

/// Computes compliance of documents and files
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    analyzer: TaskAnalyzer,
    options: ValidationOptions,
}

impl ValidationEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new(analyzer: TaskAnalyzer, options: ValidationOptions) -> Self {
        Self { analyzer, options }
    }

    /// Options in use
    #[inline]
    #[must_use]
    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    /// Validate a parsed document
    #[must_use]
    pub fn validate(&self, document: &Document, table: &MappingTable) -> ValidationResult {
        let started = Instant::now();
        let strict = self.options.strict;
        let mut issues = Vec::new();
        let mut already_qualified = 0;
        let mut still_short = 0;
        let mut unknown_modules = 0;

        for anomaly in document.anomalies() {
            issues.push(ValidationIssue {
                line: anomaly.line,
                column: anomaly.column,
                severity: Severity::Warning,
                message: anomaly.message.clone(),
                suggestion: "rewrite the entry as a task mapping".to_string(),
                module_name: None,
                expected_full_name: None,
            });
        }

        for block in document.task_blocks() {
            let classification = self.analyzer.classify(block, table);
            for note in &classification.notes {
                let (line, column) = key_position(block, &note.key);
                issues.push(ValidationIssue {
                    line,
                    column,
                    severity: Severity::Warning,
                    message: note.message.clone(),
                    suggestion: format!("check whether '{}' belongs under the module parameters", note.key),
                    module_name: classification.module_key.clone(),
                    expected_full_name: None,
                });
            }

            let Some(key) = classification.module_key else {
                continue;
            };
            let (line, column) = key_position(block, &key);

            if is_fully_qualified(&key) {
                already_qualified += 1;
            } else if let Some(expected) = table.lookup(&key) {
                still_short += 1;
                issues.push(ValidationIssue {
                    line,
                    column,
                    severity: Severity::Error,
                    message: format!("short module name '{key}' used"),
                    suggestion: expected.to_string(),
                    module_name: Some(key.clone()),
                    expected_full_name: Some(expected.to_string()),
                });
            } else {
                unknown_modules += 1;
                if strict {
                    issues.push(ValidationIssue {
                        line,
                        column,
                        severity: Severity::Info,
                        message: format!("unknown module '{key}'"),
                        suggestion: format!(
                            "use the fully-qualified name for '{key}' or add it to the mapping table"
                        ),
                        module_name: Some(key.clone()),
                        expected_full_name: None,
                    });
                }
            }
        }

        issues.sort_by_key(|i| (i.line, i.column));
        let total_modules = already_qualified + still_short;
        let score = compliance_score(already_qualified, total_modules);
        let valid = if strict {
            still_short == 0 && issues.is_empty()
        } else {
            still_short == 0
        };

        tracing::debug!(
            path = %document.path().display(),
            score,
            total_modules,
            already_qualified,
            still_short,
            "validated"
        );

        ValidationResult {
            file_path: document.path().to_path_buf(),
            valid,
            issues,
            score,
            total_modules,
            already_qualified,
            still_short,
            unknown_modules,
            errors: Vec::new(),
            elapsed: started.elapsed(),
        }
    }

    /// Read, parse and validate a file
    #[must_use]
    pub fn validate_file(&self, path: &Path, table: &MappingTable) -> ValidationResult {
        let started = Instant::now();
        match Document::load(path, self.analyzer.keywords()) {
            Ok(document) => {
                let mut result = self.validate(&document, table);
                result.elapsed = started.elapsed();
                result
            }
            Err(e) => ValidationResult::failed(path.to_path_buf(), &e, started),
        }
    }
}

fn key_position(block: &Block, key: &str) -> (usize, usize) {
    block
        .entry(key)
        .and_then(|e| e.location)
        .map_or((block.line, block.column), |loc| (loc.line, loc.column))
}
