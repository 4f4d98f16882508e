//! Control keywords of a task
//!
//! Keys in this set are task metadata and are never treated as module
//! invocations, even when a mapping table happens to contain the same name.

use std::collections::BTreeSet;

/// Version tag of the built-in keyword list
pub const KEYWORD_SET_VERSION: &str = "2.16";

/// Keywords valid on a task, handler or block
const TASK_KEYWORDS: &[&str] = &[
    "action",
    "always",
    "any_errors_fatal",
    "args",
    "async",
    "become",
    "become_exe",
    "become_flags",
    "become_method",
    "become_user",
    "block",
    "changed_when",
    "check_mode",
    "collections",
    "connection",
    "debugger",
    "delay",
    "delegate_facts",
    "delegate_to",
    "diff",
    "environment",
    "failed_when",
    "ignore_errors",
    "ignore_unreachable",
    "listen",
    "local_action",
    "loop",
    "loop_control",
    "module_defaults",
    "name",
    "no_log",
    "notify",
    "poll",
    "port",
    "register",
    "remote_user",
    "rescue",
    "retries",
    "run_once",
    "tags",
    "throttle",
    "timeout",
    "until",
    "vars",
    "when",
];

/// Keys that nest further task lists
const NESTING_KEYWORDS: &[&str] = &["block", "rescue", "always"];

/// Prefix shared by legacy looping directives (`with_items`, `with_dict`, ...)
const LOOP_PREFIX: &str = "with_";

/// Fixed, versioned set of control keywords
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlKeywordSet {
    version: String,
    keywords: BTreeSet<String>,
}

impl ControlKeywordSet {
    /// Built-in keyword set
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: KEYWORD_SET_VERSION.to_string(),
            keywords: TASK_KEYWORDS.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    /// Built-in set plus extra keywords
    #[must_use]
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::builtin();
        set.keywords.extend(extra.into_iter().map(Into::into));
        set
    }

    /// Whether the key is task metadata
    #[inline]
    #[must_use]
    pub fn is_control(&self, key: &str) -> bool {
        key.starts_with(LOOP_PREFIX) || self.keywords.contains(key)
    }

    /// Whether the key holds a nested task list
    #[inline]
    #[must_use]
    pub fn is_nesting(&self, key: &str) -> bool {
        NESTING_KEYWORDS.contains(&key)
    }

    /// Version tag
    #[inline]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of explicit keywords (prefix rules excluded)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Check if there are no explicit keywords
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl Default for ControlKeywordSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_core_keywords() {
        let set = ControlKeywordSet::builtin();
        for key in ["name", "when", "loop", "register", "tags", "become", "block", "notify"] {
            assert!(set.is_control(key), "{key} should be a control keyword");
        }
        assert!(!set.is_control("copy"));
        assert!(!set.is_control("user"));
    }

    #[test]
    fn with_prefix_is_control() {
        let set = ControlKeywordSet::builtin();
        assert!(set.is_control("with_items"));
        assert!(set.is_control("with_fileglob"));
        assert!(!set.is_control("without"));
    }

    #[test]
    fn nesting_keywords() {
        let set = ControlKeywordSet::builtin();
        assert!(set.is_nesting("block"));
        assert!(set.is_nesting("rescue"));
        assert!(!set.is_nesting("tasks"));
    }

    #[test]
    fn extra_keywords() {
        let set = ControlKeywordSet::with_extra(["x_custom"]);
        assert!(set.is_control("x_custom"));
        assert_eq!(set.len(), ControlKeywordSet::builtin().len() + 1);
        assert_eq!(set.version(), KEYWORD_SET_VERSION);
    }
}
