//! Task analyzer
//!
//! Decides, for one task-like block, which direct-child key is the module
//! invocation. Structure decides candidacy: only direct children that are
//! not control keywords are candidates, so a parameter nested under the
//! module key is never considered, whatever its name. The mapping table is
//! consulted only to break ties between several direct-child candidates.
//!
//! # Conflict policy
//!
//! | candidates | outcome                                                        |
//! |------------|----------------------------------------------------------------|
//! | 0          | not a module invocation                                        |
//! | 1          | that key                                                       |
//! | > 1        | chosen by [`TieBreak`]; the rest are reported as extra keys    |

use crate::document::{Block, Entry, Node, Shape};
use crate::keywords::ControlKeywordSet;
use crate::mapping::{is_fully_qualified, MappingTable};
use serde::{Deserialize, Serialize};

/// Control key that may carry module parameters
const ARGS_KEY: &str = "args";

/// How to pick the module key among several direct-child candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Prefer recognized names whose value looks like a module call,
    /// then fall back to document order
    #[default]
    StructuralFit,
    /// Always take the first candidate in document order
    DocumentOrder,
}

/// Analyzer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerPolicy {
    /// Tie-break rule for multiple candidates
    #[serde(default)]
    pub tie_break: TieBreak,
}

/// Kind of analyzer finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Non-control direct child that was not chosen as the module key
    SuspiciousExtraKey,
    /// Several recognized module names compete for the same task
    ConflictingModules,
}

/// Finding attached to a classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzerNote {
    /// Finding kind
    pub kind: NoteKind,
    /// Key the finding is about
    pub key: String,
    /// Human-readable description
    pub message: String,
}

/// Result of classifying one block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Module-invocation key, if any
    pub module_key: Option<String>,
    /// Key whose nested mapping holds the module parameters
    pub parameter_owner: Option<String>,
    /// Direct-child candidates demoted in favor of `module_key`
    pub extra_keys: Vec<String>,
    /// Ambiguity findings
    pub notes: Vec<AnalyzerNote>,
}

impl Classification {
    /// Check whether a module key was identified
    #[inline]
    #[must_use]
    pub fn is_invocation(&self) -> bool {
        self.module_key.is_some()
    }

    /// Check whether the decision involved a conflict
    #[inline]
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        !self.notes.is_empty()
    }
}

/// Structural classifier for task-like blocks
#[derive(Debug, Clone, Default)]
pub struct TaskAnalyzer {
    keywords: ControlKeywordSet,
    policy: AnalyzerPolicy,
}

impl TaskAnalyzer {
    /// Create analyzer with the built-in keyword set and default policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create analyzer with explicit settings
    #[inline]
    #[must_use]
    pub fn with_config(keywords: ControlKeywordSet, policy: AnalyzerPolicy) -> Self {
        Self { keywords, policy }
    }

    /// Keyword set in use
    #[inline]
    #[must_use]
    pub fn keywords(&self) -> &ControlKeywordSet {
        &self.keywords
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> AnalyzerPolicy {
        self.policy
    }

    /// Classify the direct children of a block
    ///
    /// Pure function of the block structure; `table` only confirms names
    /// when more than one candidate remains.
    #[must_use]
    pub fn classify(&self, block: &Block, table: &MappingTable) -> Classification {
        let candidates: Vec<&Entry> = block
            .entries
            .iter()
            .filter(|e| !self.keywords.is_control(&e.key))
            .collect();

        let chosen = match candidates.as_slice() {
            [] => None,
            [_] => Some(0),
            many => Some(self.pick(many, table)),
        };

        let Some(chosen) = chosen else {
            tracing::debug!(block = %block.path, "no module key");
            return Classification::default();
        };

        let module = candidates[chosen];
        let mut classification = Classification {
            module_key: Some(module.key.clone()),
            parameter_owner: parameter_owner(block, module),
            ..Classification::default()
        };

        if candidates.len() > 1 {
            let recognized: Vec<&str> = candidates
                .iter()
                .filter(|e| is_recognized(&e.key, table))
                .map(|e| e.key.as_str())
                .collect();
            if recognized.len() > 1 {
                classification.notes.push(AnalyzerNote {
                    kind: NoteKind::ConflictingModules,
                    key: module.key.clone(),
                    message: format!(
                        "task names several modules ({}); using '{}'",
                        recognized.join(", "),
                        module.key
                    ),
                });
            }
            for (i, extra) in candidates.iter().enumerate() {
                if i == chosen {
                    continue;
                }
                classification.extra_keys.push(extra.key.clone());
                classification.notes.push(AnalyzerNote {
                    kind: NoteKind::SuspiciousExtraKey,
                    key: extra.key.clone(),
                    message: format!(
                        "suspicious extra key '{}' next to module '{}'",
                        extra.key, module.key
                    ),
                });
            }
            tracing::warn!(
                block = %block.path,
                module = %module.key,
                extras = ?classification.extra_keys,
                "ambiguous task"
            );
        } else {
            tracing::debug!(block = %block.path, module = %module.key, "module key");
        }

        classification
    }

    /// Index of the winning candidate (at least two present)
    fn pick(&self, candidates: &[&Entry], table: &MappingTable) -> usize {
        match self.policy.tie_break {
            TieBreak::DocumentOrder => 0,
            TieBreak::StructuralFit => {
                let mut best = 0;
                let mut best_score = fit_score(candidates[0], table);
                for (i, entry) in candidates.iter().enumerate().skip(1) {
                    let score = fit_score(entry, table);
                    // strict: earlier candidates win ties
                    if score > best_score {
                        best = i;
                        best_score = score;
                    }
                }
                best
            }
        }
    }
}

/// Known module name: fully qualified or present in the table
fn is_recognized(key: &str, table: &MappingTable) -> bool {
    is_fully_qualified(key) || table.recognizes(key)
}

/// How well an entry fits a module call
///
/// Name recognition dominates; among equally recognized keys a mapping
/// value beats a scalar, and a sequence never looks like a module call.
fn fit_score(entry: &Entry, table: &MappingTable) -> u8 {
    let shape = match entry.value.shape() {
        Shape::Mapping => 2,
        Shape::Scalar => 1,
        Shape::Sequence => 0,
    };
    let name = if is_recognized(&entry.key, table) && shape > 0 {
        4
    } else {
        0
    };
    name + shape
}

fn parameter_owner(block: &Block, module: &Entry) -> Option<String> {
    if matches!(module.value, Node::Mapping(_)) {
        return Some(module.key.clone());
    }
    block
        .entry(ARGS_KEY)
        .filter(|args| matches!(args.value, Node::Mapping(_)))
        .map(|args| args.key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn table() -> MappingTable {
        MappingTable::from_pairs([
            ("user", "ns.col.user"),
            ("group", "ns.col.group"),
            ("copy", "ansible.builtin.copy"),
            ("shell", "ansible.builtin.shell"),
        ])
    }

    fn classify_with(text: &str, analyzer: &TaskAnalyzer) -> Classification {
        let doc = Document::parse("tasks.yml", text, analyzer.keywords()).unwrap();
        let block = doc.task_blocks().next().unwrap();
        analyzer.classify(block, &table())
    }

    fn classify(text: &str) -> Classification {
        classify_with(text, &TaskAnalyzer::new())
    }

    #[test]
    fn nested_parameter_is_not_a_candidate() {
        let c = classify("- name: Add user\n  user:\n    name: johnd\n    group: admin\n");
        assert_eq!(c.module_key.as_deref(), Some("user"));
        assert_eq!(c.parameter_owner.as_deref(), Some("user"));
        assert!(c.extra_keys.is_empty());
        assert!(!c.is_ambiguous());
    }

    #[test]
    fn single_unknown_key_is_module() {
        let c = classify("- name: custom\n  my_module: {a: 1}\n  when: x\n");
        assert_eq!(c.module_key.as_deref(), Some("my_module"));
    }

    #[test]
    fn no_candidates() {
        let c = classify("- name: only control\n  when: x\n  tags: [a]\n");
        assert!(!c.is_invocation());
        assert_eq!(c, Classification::default());
    }

    #[test]
    fn args_owner_for_free_form_module() {
        let c = classify("- shell: echo hi\n  args:\n    chdir: /tmp\n");
        assert_eq!(c.module_key.as_deref(), Some("shell"));
        assert_eq!(c.parameter_owner.as_deref(), Some("args"));

        let c = classify("- shell: echo hi\n");
        assert_eq!(c.parameter_owner, None);
    }

    #[test]
    fn structural_fit_prefers_recognized_name() {
        let c = classify("- name: t\n  extra_thing: [1, 2]\n  copy:\n    src: a\n");
        assert_eq!(c.module_key.as_deref(), Some("copy"));
        assert_eq!(c.extra_keys, ["extra_thing"]);
        assert_eq!(c.notes.len(), 1);
        assert_eq!(c.notes[0].kind, NoteKind::SuspiciousExtraKey);
    }

    #[test]
    fn structural_fit_rejects_sequence_shape() {
        let c = classify("- name: t\n  group: [a, b]\n  user:\n    name: x\n");
        assert_eq!(c.module_key.as_deref(), Some("user"));
        assert!(c
            .notes
            .iter()
            .any(|n| n.kind == NoteKind::ConflictingModules));
    }

    #[test]
    fn structural_fit_ties_go_to_document_order() {
        let c = classify("- name: t\n  foo: 1\n  bar: 2\n");
        assert_eq!(c.module_key.as_deref(), Some("foo"));
        assert_eq!(c.extra_keys, ["bar"]);
    }

    #[test]
    fn document_order_policy() {
        let analyzer = TaskAnalyzer::with_config(
            ControlKeywordSet::builtin(),
            AnalyzerPolicy {
                tie_break: TieBreak::DocumentOrder,
            },
        );
        let c = classify_with("- name: t\n  extra_thing: [1, 2]\n  copy:\n    src: a\n", &analyzer);
        assert_eq!(c.module_key.as_deref(), Some("extra_thing"));
        assert_eq!(c.extra_keys, ["copy"]);
    }

    #[test]
    fn control_keyword_in_table_is_ignored() {
        let table = MappingTable::from_pairs([("name", "ns.col.name"), ("debug", "ns.col.debug")]);
        let doc = Document::parse("t.yml", "- name: x\n  debug: msg=hi\n", &ControlKeywordSet::builtin())
            .unwrap();
        let c = TaskAnalyzer::new().classify(doc.task_blocks().next().unwrap(), &table);
        assert_eq!(c.module_key.as_deref(), Some("debug"));
    }

    #[test]
    fn fully_qualified_key_is_recognized() {
        let c = classify("- name: t\n  thing: 1\n  community.general.foo:\n    a: b\n");
        assert_eq!(c.module_key.as_deref(), Some("community.general.foo"));
    }
}
