//! Document model
//!
//! A [`Document`] is one parsed file: the original text, the parsed value
//! tree of every YAML document in the stream, the source [`Outline`], and
//! the ordered list of [`Block`]s found in it.
//!
//! # Block discovery
//!
//! ```text
//! top-level sequence item ── has `hosts` ──▶ play (Other)
//!        │                                    └─ tasks / pre_tasks / post_tasks / handlers ─▶ task lists
//!        └── otherwise ─────────────────────▶ task (TaskLike)
//!                                             └─ block / rescue / always ─▶ task lists
//! top-level mapping ────────────────────────▶ Other (vars, metadata)
//! ```
//!
//! Files whose role is [`FileRole::Data`] only ever yield `Other` blocks.

mod node;
mod outline;

pub use node::{Node, NodePath, Scalar, Segment, Shape};
pub use outline::{ItemLocation, KeyLocation, Outline, OutlineGap};

use crate::error::ParseError;
use crate::keywords::ControlKeywordSet;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Play keys that hold task lists
const PLAY_TASK_SECTIONS: &[&str] = &["pre_tasks", "tasks", "post_tasks", "handlers"];

/// Directories whose files are data, not tasks
const DATA_DIRS: &[&str] = &["vars", "defaults", "meta", "files", "templates"];

/// Directories that make every file below them data
const DATA_TREES: &[&str] = &["group_vars", "host_vars", ".github"];

/// Well-known data file names
const DATA_FILES: &[&str] = &[
    "requirements.yml",
    "requirements.yaml",
    "galaxy.yml",
    "galaxy.yaml",
    ".ansible-lint",
    ".ansible-lint.yml",
    ".yamllint",
    ".yamllint.yml",
    ".pre-commit-config.yaml",
    ".pre-commit-hooks.yaml",
    ".gitlab-ci.yml",
    "docker-compose.yml",
    "mkdocs.yml",
];

/// What a file is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    /// Plays and/or task lists
    Automation,
    /// Variables, metadata or tool configuration; never rewritten
    Data,
}

impl FileRole {
    /// Classify a file by its path
    ///
    /// A file is data when its name is a well-known data file, when it sits
    /// anywhere below `group_vars/`, `host_vars/` or `.github/`, directly in
    /// a data directory, or anywhere below a role's data directory
    /// (`roles/<role>/files/...`).
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if DATA_FILES.contains(&file_name) {
            return Self::Data;
        }

        let dirs: Vec<&str> = path
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .filter_map(|c| c.as_os_str().to_str())
            .collect();

        let in_data_tree = dirs.iter().any(|d| DATA_TREES.contains(d));
        let in_data_dir = dirs.last().is_some_and(|d| DATA_DIRS.contains(d));
        let in_role_data = dirs
            .windows(3)
            .any(|w| w[0] == "roles" && DATA_DIRS.contains(&w[2]));

        if in_data_tree || in_data_dir || in_role_data {
            Self::Data
        } else {
            Self::Automation
        }
    }
}

/// Kind of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A unit of work that may invoke one module
    TaskLike,
    /// Plays, vars files, plain data; never touched
    Other,
}

/// One direct child of a block
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Key as parsed
    pub key: String,
    /// Value as parsed
    pub value: Node,
    /// Key position in the source, when the outline located it
    pub location: Option<KeyLocation>,
}

/// Ordered key/value mapping found in a document
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Task-like or other
    pub kind: BlockKind,
    /// Position of the mapping in the document tree
    pub path: NodePath,
    /// Direct children in source order
    pub entries: Vec<Entry>,
    /// 1-based line of the block start (0 when unknown)
    pub line: usize,
    /// 1-based column of the block start (0 when unknown)
    pub column: usize,
}

impl Block {
    /// Entry for a key
    #[inline]
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Keys in source order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Check for task-like kind
    #[inline]
    #[must_use]
    pub fn is_task_like(&self) -> bool {
        self.kind == BlockKind::TaskLike
    }
}

/// Structural problem in a task list that does not stop processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// Position of the offending node
    pub path: NodePath,
    /// 1-based line (0 when unknown)
    pub line: usize,
    /// 1-based column (0 when unknown)
    pub column: usize,
    /// Human-readable description
    pub message: String,
}

/// Parsed file
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    source: String,
    role: FileRole,
    roots: Vec<Node>,
    outline: Outline,
    blocks: Vec<Block>,
    anomalies: Vec<Anomaly>,
}

impl Document {
    /// Read and parse a file
    ///
    /// # Errors
    /// - `ParseError::Io` if the file cannot be read
    /// - `ParseError::SyntaxError` if it is not well-formed YAML
    pub fn load(path: impl AsRef<Path>, keywords: &ControlKeywordSet) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ParseError::io_error(path, e))?;
        Self::parse(path, source, keywords)
    }

    /// Parse text, taking the file role from `path`
    ///
    /// # Errors
    /// `ParseError::SyntaxError` if the text is not well-formed YAML
    pub fn parse(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        keywords: &ControlKeywordSet,
    ) -> Result<Self, ParseError> {
        let path = path.into();
        let role = FileRole::from_path(&path);
        Self::parse_with_role(path, source, role, keywords)
    }

    /// Parse text with an explicit file role
    ///
    /// # Errors
    /// `ParseError::SyntaxError` if the text is not well-formed YAML
    pub fn parse_with_role(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        role: FileRole,
        keywords: &ControlKeywordSet,
    ) -> Result<Self, ParseError> {
        let path = path.into();
        let source = source.into();
        let roots = parse_stream(&path, &source)?;
        let outline = Outline::scan(&source);

        let mut collector = BlockCollector {
            outline: &outline,
            keywords,
            role,
            blocks: Vec::new(),
            anomalies: Vec::new(),
        };
        for (index, root) in roots.iter().enumerate() {
            collector.root(NodePath::root(index), root);
        }
        let BlockCollector {
            blocks, anomalies, ..
        } = collector;

        tracing::trace!(
            path = %path.display(),
            documents = roots.len(),
            blocks = blocks.len(),
            "parsed document"
        );

        Ok(Self {
            path,
            source,
            role,
            roots,
            outline,
            blocks,
            anomalies,
        })
    }

    /// File path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Original text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// File role
    #[inline]
    #[must_use]
    pub fn role(&self) -> FileRole {
        self.role
    }

    /// Parsed value tree of each YAML document
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Source outline
    #[inline]
    #[must_use]
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    /// Blocks in document order
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Task-like blocks in document order
    pub fn task_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_task_like())
    }

    /// Non-fatal structural problems
    #[inline]
    #[must_use]
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }
}

/// Parse every document of a YAML stream
fn parse_stream(path: &Path, source: &str) -> Result<Vec<Node>, ParseError> {
    serde_yaml::Deserializer::from_str(source)
        .map(|doc| {
            Value::deserialize(doc)
                .map(|value| Node::from_yaml(&value))
                .map_err(|e| ParseError::syntax_error(path, e.to_string()))
        })
        .collect()
}

struct BlockCollector<'a> {
    outline: &'a Outline,
    keywords: &'a ControlKeywordSet,
    role: FileRole,
    blocks: Vec<Block>,
    anomalies: Vec<Anomaly>,
}

impl BlockCollector<'_> {
    fn root(&mut self, path: NodePath, node: &Node) {
        match node {
            Node::Sequence(items) if self.role == FileRole::Automation => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = path.index(i);
                    match item.as_mapping() {
                        Some(map) if map.contains_key("hosts") => self.play(item_path, item),
                        Some(_) => self.task(item_path, item),
                        None if item.is_null() => {}
                        None => self.anomaly(&item_path, item),
                    }
                }
            }
            Node::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if item.as_mapping().is_some() {
                        self.push(BlockKind::Other, path.index(i), item);
                    }
                }
            }
            Node::Mapping(_) => self.push(BlockKind::Other, path, node),
            Node::Scalar(_) => {}
        }
    }

    fn play(&mut self, path: NodePath, node: &Node) {
        self.push(BlockKind::Other, path.clone(), node);
        let Some(map) = node.as_mapping() else {
            return;
        };
        for (key, value) in map {
            if PLAY_TASK_SECTIONS.contains(&key.as_str()) {
                self.task_list(path.key(key.as_str()), value);
            }
        }
    }

    fn task(&mut self, path: NodePath, node: &Node) {
        self.push(BlockKind::TaskLike, path.clone(), node);
        let Some(map) = node.as_mapping() else {
            return;
        };
        for (key, value) in map {
            if self.keywords.is_nesting(key) {
                self.task_list(path.key(key.as_str()), value);
            }
        }
    }

    fn task_list(&mut self, path: NodePath, node: &Node) {
        let Some(items) = node.as_sequence() else {
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let item_path = path.index(i);
            match item {
                Node::Mapping(_) => self.task(item_path, item),
                _ if item.is_null() => {}
                _ => self.anomaly(&item_path, item),
            }
        }
    }

    fn push(&mut self, kind: BlockKind, path: NodePath, node: &Node) {
        let Some(map) = node.as_mapping() else {
            return;
        };
        let entries: Vec<Entry> = map
            .iter()
            .map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
                location: self.outline.key(&path.key(key.as_str())).copied(),
            })
            .collect();

        let (line, column) = self
            .outline
            .item(&path)
            .map(|item| (item.line, item.column))
            .or_else(|| {
                entries
                    .iter()
                    .find_map(|e| e.location.map(|loc| (loc.line, loc.column)))
            })
            .unwrap_or((0, 0));

        self.blocks.push(Block {
            kind,
            path,
            entries,
            line,
            column,
        });
    }

    fn anomaly(&mut self, path: &NodePath, node: &Node) {
        let (line, column) = self
            .outline
            .item(path)
            .map_or((0, 0), |item| (item.line, item.column));
        self.anomalies.push(Anomaly {
            path: path.clone(),
            line,
            column,
            message: format!("task entry is a {}, expected a mapping", node.shape()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, text: &str) -> Document {
        Document::parse(path, text, &ControlKeywordSet::builtin()).unwrap()
    }

    #[test]
    fn task_file_blocks() {
        let doc = parse(
            "roles/web/tasks/main.yml",
            "- name: a\n  copy: {src: x}\n- name: b\n  file:\n    path: /tmp\n",
        );
        assert_eq!(doc.blocks().len(), 2);
        assert!(doc.blocks().iter().all(Block::is_task_like));
        let keys: Vec<_> = doc.blocks()[1].keys().collect();
        assert_eq!(keys, ["name", "file"]);
        assert_eq!(doc.blocks()[1].line, 3);
        assert_eq!(doc.blocks()[1].entry("file").unwrap().location.unwrap().line, 4);
    }

    #[test]
    fn playbook_sections_in_order() {
        let doc = parse(
            "site.yml",
            "\
- hosts: all
  pre_tasks:
    - ping:
  roles:
    - common
  tasks:
    - name: t
      block:
        - debug: msg=inner
      rescue:
        - fail: msg=oops
  handlers:
    - name: h
      service: name=x state=restarted
",
        );
        let kinds: Vec<_> = doc.blocks().iter().map(|b| (b.kind, b.path.to_string())).collect();
        assert_eq!(
            kinds,
            [
                (BlockKind::Other, "doc0[0]".to_string()),
                (BlockKind::TaskLike, "doc0[0].pre_tasks[0]".to_string()),
                (BlockKind::TaskLike, "doc0[0].tasks[0]".to_string()),
                (BlockKind::TaskLike, "doc0[0].tasks[0].block[0]".to_string()),
                (BlockKind::TaskLike, "doc0[0].tasks[0].rescue[0]".to_string()),
                (BlockKind::TaskLike, "doc0[0].handlers[0]".to_string()),
            ]
        );
    }

    #[test]
    fn vars_file_is_other() {
        let doc = parse("vars.yml", "user: admin\ngroup: wheel\n");
        assert_eq!(doc.blocks().len(), 1);
        assert_eq!(doc.blocks()[0].kind, BlockKind::Other);
        assert_eq!(doc.task_blocks().count(), 0);
    }

    #[test]
    fn data_role_never_task_like() {
        let doc = parse("roles/x/defaults/main.yml", "- name: a\n  copy: x\n");
        assert_eq!(doc.role(), FileRole::Data);
        assert_eq!(doc.task_blocks().count(), 0);
    }

    #[test]
    fn non_mapping_entries_are_anomalies() {
        let doc = parse("tasks.yml", "- name: a\n  ping:\n- just a string\n");
        assert_eq!(doc.task_blocks().count(), 1);
        assert_eq!(doc.anomalies().len(), 1);
        assert_eq!(doc.anomalies()[0].line, 3);
        assert!(doc.anomalies()[0].message.contains("scalar"));
    }

    #[test]
    fn multi_document_stream() {
        let doc = parse("tasks.yml", "---\n- ping:\n---\n- setup:\n");
        assert_eq!(doc.roots().len(), 2);
        let paths: Vec<_> = doc.task_blocks().map(|b| b.path.to_string()).collect();
        assert_eq!(paths, ["doc0[0]", "doc1[0]"]);
    }

    #[test]
    fn syntax_error_reported() {
        let err = Document::parse("bad.yml", "- name: [unclosed\n", &ControlKeywordSet::builtin())
            .unwrap_err();
        assert!(matches!(err, ParseError::SyntaxError { .. }));
    }

    #[test]
    fn file_roles() {
        assert_eq!(FileRole::from_path(Path::new("roles/a/tasks/main.yml")), FileRole::Automation);
        assert_eq!(FileRole::from_path(Path::new("roles/a/meta/main.yml")), FileRole::Data);
        assert_eq!(FileRole::from_path(Path::new("inventory/host_vars/web1/main.yml")), FileRole::Data);
        assert_eq!(FileRole::from_path(Path::new("requirements.yml")), FileRole::Data);
        assert_eq!(FileRole::from_path(Path::new(".github/workflows/ci.yml")), FileRole::Data);
        assert_eq!(FileRole::from_path(Path::new("playbooks/site.yml")), FileRole::Automation);
    }

    #[test]
    fn nested_data_directories_are_data() {
        for path in [
            "roles/r/files/sub/users.yml",
            "roles/r/vars/sub/main.yml",
            "roles/r/templates/sub/x.yml",
            "/srv/site/roles/r/defaults/env/prod.yml",
            "inventory/group_vars/web/nested/main.yml",
        ] {
            assert_eq!(FileRole::from_path(Path::new(path)), FileRole::Data, "{path}");
        }
        assert_eq!(
            FileRole::from_path(Path::new("roles/files/tasks/main.yml")),
            FileRole::Automation
        );
        assert_eq!(
            FileRole::from_path(Path::new("roles/r/tasks/files/main.yml")),
            FileRole::Data
        );
    }

    #[test]
    fn unlocatable_documents_are_recorded() {
        let doc = parse("tasks.yml", "- &t\n  name: x\n  copy: {src: a}\n- *t\n");
        assert_eq!(doc.task_blocks().count(), 2);
        assert!(doc.outline().gap(0).is_some());
        assert!(doc.blocks()[0].entry("copy").unwrap().location.is_none());
    }
}
