//! Conversion engine
//!
//! Rewrites module keys to their fully-qualified names by editing the
//! source text in place, so comments, quoting and layout survive. The
//! rewritten text is re-parsed and compared with the expected tree before
//! anything touches the disk.
//!
//! # Write sequence
//!
//! ```text
//! read ─▶ parse ─▶ plan edits ─▶ apply ─▶ re-parse + compare
//!                                             │
//!                        dry run / no change ─┴─▶ done
//!                                             │
//!                            backup (sibling) ─▶ temp file ─▶ rename over original
//! ```

use crate::analyzer::TaskAnalyzer;
use crate::document::{Block, Document, Node};
use crate::error::{ConversionError, FqcnError, ParseError};
use crate::keywords::ControlKeywordSet;
use crate::mapping::{is_fully_qualified, MappingTable};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default suffix appended to the original path for backups
pub const DEFAULT_BACKUP_SUFFIX: &str = ".fqcn.bak";

/// Conversion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Analyze and render only; never write
    pub dry_run: bool,
    /// Preserve the pre-image before replacing a changed file
    pub backup: bool,
    /// Suffix for the backup sibling
    pub backup_suffix: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }
}

impl ConversionOptions {
    /// Options for a dry run
    #[inline]
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Backup path for a file
    #[must_use]
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(&self.backup_suffix);
        PathBuf::from(name)
    }
}

/// One rewritten key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyChange {
    /// 1-based line of the key
    pub line: usize,
    /// 1-based column of the key
    pub column: usize,
    /// Short name found
    pub from: String,
    /// Fully-qualified replacement
    pub to: String,
}

/// Outcome of converting one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    /// File converted
    pub file_path: PathBuf,
    /// Whether the file was processed without error
    pub success: bool,
    /// Number of module keys rewritten
    pub changes_made: usize,
    /// Individual rewrites in document order
    pub changes: Vec<KeyChange>,
    /// Failures; non-empty implies `success == false`
    pub errors: Vec<String>,
    /// Non-fatal findings
    pub warnings: Vec<String>,
    /// Original text
    pub before_text: String,
    /// Converted text (equal to `before_text` when nothing changed or on failure)
    pub after_text: String,
    /// Wall time spent on the file
    pub elapsed: Duration,
    /// Backup written, if any
    pub backup_path: Option<PathBuf>,
}

impl ConversionResult {
    fn failed(file_path: PathBuf, before_text: String, error: &FqcnError, started: Instant) -> Self {
        tracing::error!(path = %file_path.display(), error = %error, "conversion failed");
        Self {
            file_path,
            success: false,
            changes_made: 0,
            changes: Vec::new(),
            errors: vec![error.to_string()],
            warnings: Vec::new(),
            after_text: before_text.clone(),
            before_text,
            elapsed: started.elapsed(),
            backup_path: None,
        }
    }

    /// Check whether the text differs after conversion
    #[inline]
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes_made > 0
    }

    /// Unified diff between the original and converted text
    #[must_use]
    pub fn diff(&self) -> String {
        if self.before_text == self.after_text {
            return String::new();
        }
        diffy::create_patch(&self.before_text, &self.after_text).to_string()
    }
}

/// Planned in-place rewrite
#[derive(Debug)]
struct Edit {
    offset: usize,
    len: usize,
    replacement: String,
}

/// Rewrites module keys in documents and files
#[derive(Debug, Clone, Default)]
pub struct ConversionEngine {
    analyzer: TaskAnalyzer,
    options: ConversionOptions,
}

impl ConversionEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new(analyzer: TaskAnalyzer, options: ConversionOptions) -> Self {
        Self { analyzer, options }
    }

    /// Options in use
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Analyzer in use
    #[inline]
    #[must_use]
    pub fn analyzer(&self) -> &TaskAnalyzer {
        &self.analyzer
    }

    /// Convert a parsed document in memory
    ///
    /// Never touches the filesystem; `after_text` holds the would-be output.
    #[must_use]
    pub fn convert(&self, document: &Document, table: &MappingTable) -> ConversionResult {
        let started = Instant::now();
        match self.rewrite(document, table) {
            Ok((after_text, changes, warnings)) => ConversionResult {
                file_path: document.path().to_path_buf(),
                success: true,
                changes_made: changes.len(),
                changes,
                errors: Vec::new(),
                warnings,
                before_text: document.source().to_string(),
                after_text,
                elapsed: started.elapsed(),
                backup_path: None,
            },
            Err(e) => ConversionResult::failed(
                document.path().to_path_buf(),
                document.source().to_string(),
                &FqcnError::from(e),
                started,
            ),
        }
    }

    /// Convert a file, persisting the result unless this is a dry run
    ///
    /// Failures are captured in the returned result; nothing is written
    /// when the file cannot be parsed or verified.
    #[must_use]
    pub fn convert_file(&self, path: &Path, table: &MappingTable) -> ConversionResult {
        let started = Instant::now();
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                let err = FqcnError::from(ParseError::io_error(path, e));
                return ConversionResult::failed(path.to_path_buf(), String::new(), &err, started);
            }
        };
        let document = match Document::parse(path, source.as_str(), self.analyzer.keywords()) {
            Ok(document) => document,
            Err(e) => {
                return ConversionResult::failed(path.to_path_buf(), source, &FqcnError::from(e), started)
            }
        };

        let mut result = self.convert(&document, table);
        if !result.success || !result.has_changes() || self.options.dry_run {
            result.elapsed = started.elapsed();
            return result;
        }

        match self.persist(path, &result.before_text, &result.after_text) {
            Ok(backup_path) => {
                tracing::info!(
                    path = %path.display(),
                    changes = result.changes_made,
                    "converted"
                );
                result.backup_path = backup_path;
            }
            Err(e) => {
                let failed =
                    ConversionResult::failed(path.to_path_buf(), source, &FqcnError::from(e), started);
                return ConversionResult {
                    warnings: result.warnings,
                    ..failed
                };
            }
        }
        result.elapsed = started.elapsed();
        result
    }

    /// Plan, apply and verify the edits for one document
    fn rewrite(
        &self,
        document: &Document,
        table: &MappingTable,
    ) -> Result<(String, Vec<KeyChange>, Vec<String>), ConversionError> {
        let path = document.path();
        let source = document.source();
        let mut expected: Vec<Node> = document.roots().to_vec();
        let mut edits = Vec::new();
        let mut changes = Vec::new();
        let mut warnings: Vec<String> = document
            .anomalies()
            .iter()
            .map(|a| format!("{}:{}: {}", a.line, a.column, a.message))
            .collect();

        for block in document.task_blocks() {
            let classification = self.analyzer.classify(block, table);
            warnings.extend(
                classification
                    .notes
                    .iter()
                    .map(|n| format!("{}:{}: {}", block.line, block.column, n.message)),
            );

            let Some(key) = classification.module_key else {
                continue;
            };
            if is_fully_qualified(&key) {
                continue;
            }
            let Some(target) = table.lookup(&key) else {
                continue;
            };

            let location = block
                .entry(&key)
                .and_then(|e| e.location)
                .filter(|loc| source.get(loc.offset..loc.offset + loc.len) == Some(key.as_str()))
                .filter(|loc| !edits.iter().any(|e: &Edit| e.offset == loc.offset));
            let Some(location) = location else {
                warnings.push(skipped_block(document, block, &key));
                continue;
            };

            let renamed = expected
                .get_mut(block.path.document)
                .is_some_and(|root| root.rename_key(&block.path.segments, &key, target));
            if !renamed {
                return Err(ConversionError::invariant(
                    path,
                    format!("block {} vanished from the parsed tree", block.path),
                ));
            }

            tracing::debug!(
                path = %path.display(),
                line = location.line,
                from = %key,
                to = %target,
                "rewrite module key"
            );
            edits.push(Edit {
                offset: location.offset,
                len: location.len,
                replacement: target.to_string(),
            });
            changes.push(KeyChange {
                line: location.line,
                column: location.column,
                from: key,
                to: target.to_string(),
            });
        }

        if edits.is_empty() {
            return Ok((source.to_string(), changes, warnings));
        }

        let after = apply_edits(source, edits);
        verify(document, &after, &expected, self.analyzer.keywords())?;
        Ok((after, changes, warnings))
    }

    /// Write backup then replace the original atomically
    fn persist(&self, path: &Path, before: &str, after: &str) -> Result<Option<PathBuf>, ConversionError> {
        let backup_path = if self.options.backup {
            let backup = self.options.backup_path(path);
            fs::write(&backup, before).map_err(|e| ConversionError::backup_error(&backup, e))?;
            Some(backup)
        } else {
            None
        };
        write_atomic(path, after)?;
        Ok(backup_path)
    }
}

/// Warning for a block whose module key cannot be edited in place
fn skipped_block(document: &Document, block: &Block, key: &str) -> String {
    let reason = document.outline().gap(block.path.document).map_or_else(
        || format!("module key '{key}' at {} is not addressable in the source text", block.path),
        |gap| format!("document {} has no source positions: {}", gap.document, gap.reason),
    );
    let error = ParseError::unsupported(document.path(), reason);
    tracing::warn!(block = %block.path, error = %error, "block skipped");
    format!(
        "{}:{}: module key '{key}' could not be located; block skipped ({error})",
        block.line, block.column
    )
}

/// Apply non-overlapping edits, last offset first
fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.offset.cmp(&a.offset));
    let mut text = source.to_string();
    for edit in edits {
        text.replace_range(edit.offset..edit.offset + edit.len, &edit.replacement);
    }
    text
}

/// Re-parse the rewritten text and compare with the expected trees
fn verify(
    document: &Document,
    after: &str,
    expected: &[Node],
    keywords: &ControlKeywordSet,
) -> Result<(), ConversionError> {
    let path = document.path();
    let reparsed = Document::parse_with_role(path, after, document.role(), keywords)
        .map_err(|e| ConversionError::invariant(path, format!("rewritten text does not parse: {e}")))?;
    let roots = reparsed.roots();
    let same = roots.len() == expected.len()
        && roots.iter().zip(expected).all(|(got, want)| got.ordered_eq(want));
    if same {
        Ok(())
    } else {
        Err(ConversionError::invariant(
            path,
            "rewritten text does not match the expected structure",
        ))
    }
}

/// Replace `path` with `contents` via a sibling temp file and rename
///
/// # Errors
/// `ConversionError::Io` if the temp file cannot be created, written or renamed
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), ConversionError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ConversionError::io_error(path, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ConversionError::io_error(path, e))?;
    if let Ok(metadata) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| ConversionError::io_error(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| ConversionError::io_error(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn table() -> MappingTable {
        MappingTable::from_pairs([
            ("user", "ns.col.user"),
            ("group", "ns.col.group"),
            ("copy", "ansible.builtin.copy"),
            ("debug", "ansible.builtin.debug"),
        ])
    }

    fn convert(text: &str) -> ConversionResult {
        let doc = Document::parse("tasks.yml", text, &ControlKeywordSet::builtin()).unwrap();
        ConversionEngine::default().convert(&doc, &table())
    }

    #[test]
    fn rewrites_module_key_only() {
        let result = convert("- name: Add user\n  user:\n    name: johnd\n    group: admin\n");
        assert!(result.success);
        assert_eq!(result.changes_made, 1);
        assert_eq!(
            result.after_text,
            "- name: Add user\n  ns.col.user:\n    name: johnd\n    group: admin\n"
        );
    }

    #[test]
    fn preserves_comments_and_quotes() {
        let text = "\
# top comment
- name: copy it   # trailing
  \"copy\":
    src: a   # keep
    dest: b

- debug: msg=hi
";
        let result = convert(text);
        assert_eq!(result.changes_made, 2);
        assert_eq!(
            result.after_text,
            "\
# top comment
- name: copy it   # trailing
  \"ansible.builtin.copy\":
    src: a   # keep
    dest: b

- ansible.builtin.debug: msg=hi
"
        );
        assert_eq!(result.changes[0].line, 3);
        assert_eq!(result.changes[1].from, "debug");
    }

    #[test]
    fn flow_mapping_task() {
        let result = convert("- {name: x, copy: {src: a, dest: b}}\n");
        assert_eq!(result.after_text, "- {name: x, ansible.builtin.copy: {src: a, dest: b}}\n");
    }

    #[test]
    fn unmapped_and_qualified_keys_untouched() {
        let text = "- custom_mod: {a: 1}\n- ns.col.user: {name: x}\n";
        let result = convert(text);
        assert!(result.success);
        assert_eq!(result.changes_made, 0);
        assert_eq!(result.after_text, text);
        assert!(result.diff().is_empty());
    }

    #[test]
    fn second_pass_is_noop() {
        let first = convert("- group: {name: admin}\n- user: {name: u}\n");
        let second = convert(&first.after_text);
        assert_eq!(second.changes_made, 0);
        assert_eq!(second.after_text, first.after_text);
    }

    #[test]
    fn ambiguity_becomes_warning() {
        let result = convert("- name: t\n  notes: [a]\n  copy: {src: a}\n");
        assert_eq!(result.changes_made, 1);
        assert!(result.warnings.iter().any(|w| w.contains("notes")));
    }

    #[test]
    fn diff_shows_rewrite() {
        let result = convert("- copy: {src: a}\n");
        let diff = result.diff();
        assert!(diff.contains("-- copy: {src: a}"));
        assert!(diff.contains("+- ansible.builtin.copy: {src: a}"));
    }

    #[test]
    fn convert_file_writes_backup_and_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.yml");
        fs::write(&path, "- user: {name: x}\n").unwrap();

        let result = ConversionEngine::default().convert_file(&path, &table());
        assert!(result.success, "{:?}", result.errors);
        let backup = result.backup_path.clone().unwrap();
        assert_eq!(backup, dir.path().join("main.yml.fqcn.bak"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "- user: {name: x}\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "- ns.col.user: {name: x}\n");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.yml");
        fs::write(&path, "- user: {name: x}\n").unwrap();

        let engine = ConversionEngine::new(TaskAnalyzer::new(), ConversionOptions::dry_run());
        let result = engine.convert_file(&path, &table());
        assert_eq!(result.changes_made, 1);
        assert!(result.backup_path.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "- user: {name: x}\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn parse_failure_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yml");
        fs::write(&path, "- user: [unclosed\n").unwrap();

        let result = ConversionEngine::default().convert_file(&path, &table());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_is_reported() {
        let result = ConversionEngine::default().convert_file(Path::new("/nonexistent/x.yml"), &table());
        assert!(!result.success);
        assert!(result.errors[0].contains("/nonexistent/x.yml"));
    }

    #[test]
    fn flow_mapping_across_lines() {
        let result = convert("- {name: x,\n   copy: {src: a, dest: b}}\n- user: {name: u}\n");
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.changes_made, 2);
        assert_eq!(
            result.after_text,
            "- {name: x,\n   ansible.builtin.copy: {src: a, dest: b}}\n- ns.col.user: {name: u}\n"
        );
    }

    #[test]
    fn unaddressable_key_skips_only_its_block() {
        let text = "- \"co\\x70y\": {src: a}\n- user: {name: u}\n";
        let result = convert(text);
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.changes_made, 1);
        assert_eq!(result.changes[0].from, "user");
        assert_eq!(result.after_text, "- \"co\\x70y\": {src: a}\n- ns.col.user: {name: u}\n");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("module key 'copy' could not be located; block skipped")));
    }

    #[test]
    fn aliased_document_is_skipped_not_failed() {
        let text = "---\n- &t\n  name: x\n  copy: {src: a}\n- *t\n---\n- user: {name: u}\n";
        let result = convert(text);
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.changes_made, 1);
        assert_eq!(
            result.after_text,
            "---\n- &t\n  name: x\n  copy: {src: a}\n- *t\n---\n- ns.col.user: {name: u}\n"
        );
        assert_eq!(
            result.warnings.iter().filter(|w| w.contains("block skipped")).count(),
            2
        );
    }
}
