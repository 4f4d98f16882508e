//! Short name → fully-qualified name mapping table
//!
//! The table is assembled once per run from ordered layers:
//! built-in defaults, then a user mapping file, then inline overrides.
//! Later layers win per key. After [`MappingTableBuilder::build`] the
//! table is immutable and can be shared across workers by reference.

use crate::error::MappingError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Embedded default mappings
const DEFAULT_MAPPINGS: &str = include_str!("../data/default_mappings.yml");

/// `namespace.collection.module`, optionally with deeper segments
static QUALIFIED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+\.[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)+$")
        .unwrap_or_else(|e| unreachable!("static pattern is valid: {e}"))
});

/// Check whether a module name is already fully qualified
#[inline]
#[must_use]
pub fn is_fully_qualified(name: &str) -> bool {
    QUALIFIED_NAME.is_match(name)
}

/// One `short → fully-qualified` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Bare module name as written by authors
    pub short_name: String,
    /// Namespaced identifier
    pub fully_qualified_name: String,
}

impl MappingEntry {
    /// Create new entry
    #[inline]
    #[must_use]
    pub fn new(short_name: impl Into<String>, fully_qualified_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            fully_qualified_name: fully_qualified_name.into(),
        }
    }

    /// Parse an inline override of the form `short=ns.col.module`
    ///
    /// # Errors
    /// `MappingError::InvalidEntry` if the text has no `=` or either side is invalid
    pub fn parse_override(spec: &str) -> Result<Self, MappingError> {
        let (short, target) = spec
            .split_once('=')
            .ok_or_else(|| MappingError::invalid_entry(spec, "", "expected SHORT=FULLY.QUALIFIED.NAME"))?;
        let entry = Self::new(short.trim(), target.trim());
        entry.check()?;
        Ok(entry)
    }

    fn check(&self) -> Result<(), MappingError> {
        if self.short_name.is_empty() {
            return Err(MappingError::invalid_entry(
                &self.short_name,
                &self.fully_qualified_name,
                "short name is empty",
            ));
        }
        if is_fully_qualified(&self.short_name) {
            return Err(MappingError::invalid_entry(
                &self.short_name,
                &self.fully_qualified_name,
                "short name is already fully qualified",
            ));
        }
        if !is_fully_qualified(&self.fully_qualified_name) {
            return Err(MappingError::invalid_entry(
                &self.short_name,
                &self.fully_qualified_name,
                "target is not fully qualified",
            ));
        }
        Ok(())
    }
}

/// Which layer contributed an entry or warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    /// Embedded defaults
    Defaults,
    /// User mapping file
    File,
    /// Command-line or config overrides
    Inline,
}

/// Recoverable problem found while loading a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingWarning {
    /// Layer the problem came from
    pub source: MappingSource,
    /// Human-readable cause
    pub message: String,
}

/// Immutable mapping table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: BTreeMap<String, String>,
    qualified: BTreeSet<String>,
}

impl MappingTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding only the built-in defaults
    ///
    /// # Errors
    /// `MappingError::Defaults` if the embedded data cannot be parsed
    pub fn builtin() -> Result<Self, MappingError> {
        Ok(MappingTableBuilder::with_defaults()?.build())
    }

    /// Build a table directly from pairs, skipping invalid ones
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(MappingTableBuilder::new(), |builder, (k, v)| {
                builder.with_override(MappingEntry::new(k, v))
            })
            .build()
    }

    /// Fully-qualified name for a short name
    #[inline]
    #[must_use]
    pub fn lookup(&self, short_name: &str) -> Option<&str> {
        self.entries.get(short_name).map(String::as_str)
    }

    /// Whether the short name has an entry
    #[inline]
    #[must_use]
    pub fn contains_short(&self, short_name: &str) -> bool {
        self.entries.contains_key(short_name)
    }

    /// Whether the name is the target of some entry
    #[inline]
    #[must_use]
    pub fn is_known_qualified(&self, name: &str) -> bool {
        self.qualified.contains(name)
    }

    /// Whether the name is either a known short name or a known target
    #[inline]
    #[must_use]
    pub fn recognizes(&self, name: &str) -> bool {
        self.contains_short(name) || self.is_known_qualified(name)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if table has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in short-name order
    pub fn entries(&self) -> impl Iterator<Item = MappingEntry> + '_ {
        self.entries
            .iter()
            .map(|(short, fq)| MappingEntry::new(short.clone(), fq.clone()))
    }
}

/// Layered builder for [`MappingTable`]
#[derive(Debug, Clone, Default)]
pub struct MappingTableBuilder {
    entries: BTreeMap<String, String>,
    warnings: Vec<MappingWarning>,
}

impl MappingTableBuilder {
    /// Create builder with no layers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create builder seeded with the embedded defaults
    ///
    /// # Errors
    /// `MappingError::Defaults` if the embedded data is unusable; this is the
    /// only mapping failure that should stop a run.
    pub fn with_defaults() -> Result<Self, MappingError> {
        let pairs = parse_mapping_document(DEFAULT_MAPPINGS, Path::new("<defaults>"))
            .map_err(|e| MappingError::Defaults(e.to_string()))?;
        if pairs.is_empty() {
            return Err(MappingError::Defaults("no entries".to_string()));
        }
        let mut builder = Self::new();
        builder.apply(MappingSource::Defaults, pairs);
        Ok(builder)
    }

    /// Layer a mapping file on top
    ///
    /// A missing or malformed file is recorded as a warning and the
    /// previous layers stay in effect.
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| MappingError::io_error(path, e))
            .and_then(|content| parse_mapping_document(&content, path));

        match loaded {
            Ok(pairs) => {
                tracing::debug!(path = %path.display(), entries = pairs.len(), "loaded mapping file");
                self.apply(MappingSource::File, pairs);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "mapping file ignored, keeping defaults");
                self.warn(MappingSource::File, e.to_string());
            }
        }
        self
    }

    /// Layer mapping text on top (same shapes as a mapping file)
    #[must_use]
    pub fn with_str(mut self, content: &str, origin: impl AsRef<Path>) -> Self {
        match parse_mapping_document(content, origin.as_ref()) {
            Ok(pairs) => self.apply(MappingSource::File, pairs),
            Err(e) => self.warn(MappingSource::File, e.to_string()),
        }
        self
    }

    /// Layer a single inline override on top
    #[must_use]
    pub fn with_override(mut self, entry: MappingEntry) -> Self {
        self.apply(
            MappingSource::Inline,
            vec![(entry.short_name, entry.fully_qualified_name)],
        );
        self
    }

    /// Layer several inline overrides on top
    #[must_use]
    pub fn with_overrides<I>(self, entries: I) -> Self
    where
        I: IntoIterator<Item = MappingEntry>,
    {
        entries
            .into_iter()
            .fold(self, MappingTableBuilder::with_override)
    }

    /// Warnings recorded so far
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[MappingWarning] {
        &self.warnings
    }

    /// Freeze into an immutable table
    #[must_use]
    pub fn build(self) -> MappingTable {
        let qualified = self.entries.values().cloned().collect();
        MappingTable {
            entries: self.entries,
            qualified,
        }
    }

    /// Freeze and hand back the recorded warnings
    #[must_use]
    pub fn build_with_warnings(self) -> (MappingTable, Vec<MappingWarning>) {
        let warnings = self.warnings.clone();
        (self.build(), warnings)
    }

    fn apply(&mut self, source: MappingSource, pairs: Vec<(String, String)>) {
        for (short, target) in pairs {
            let entry = MappingEntry::new(short, target);
            if let Err(e) = entry.check() {
                self.warn(source, e.to_string());
                continue;
            }
            self.entries
                .insert(entry.short_name, entry.fully_qualified_name);
        }
    }

    fn warn(&mut self, source: MappingSource, message: String) {
        self.warnings.push(MappingWarning { source, message });
    }
}

/// Parse a mapping document into ordered pairs
///
/// Accepts either a flat `short: target` map or a map whose `mappings`
/// key holds that flat map.
fn parse_mapping_document(content: &str, origin: &Path) -> Result<Vec<(String, String)>, MappingError> {
    let value: Value = serde_yaml::from_str(content)
        .map_err(|e| MappingError::malformed(origin, e.to_string()))?;

    let map = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(map) => match map.get("mappings") {
            Some(Value::Mapping(inner)) => inner.clone(),
            Some(Value::Null) => return Ok(Vec::new()),
            Some(_) => {
                return Err(MappingError::malformed(origin, "'mappings' must be a mapping"));
            }
            None => map,
        },
        _ => {
            return Err(MappingError::malformed(
                origin,
                "expected a mapping of short names to fully-qualified names",
            ));
        }
    };

    map.into_iter()
        .map(|(k, v)| match (k, v) {
            (Value::String(k), Value::String(v)) => Ok((k, v)),
            (k, v) => Err(MappingError::malformed(
                origin,
                format!("entry {k:?}: {v:?} is not a string pair"),
            )),
        })
        .collect()
}
