//! Closed value model for document contents
//!
//! Every value in a document is a scalar, a mapping or a sequence. Keeping
//! the set closed lets the analyzer match exhaustively on value shape.

use indexmap::IndexMap;
use serde::Serialize;
use serde_yaml::Value;
use std::fmt;

/// Scalar leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// `~`, `null` or an empty value
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer or float, kept in its canonical text form
    Number(String),
    /// Any string
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("~"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) | Self::String(n) => f.write_str(n),
        }
    }
}

/// Shape of a node, without its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Leaf value
    Scalar,
    /// Ordered key/value mapping
    Mapping,
    /// Ordered list
    Sequence,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scalar => "scalar",
            Self::Mapping => "mapping",
            Self::Sequence => "sequence",
        })
    }
}

/// Document value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    /// Leaf value
    Scalar(Scalar),
    /// Ordered mapping; source key order is preserved
    Mapping(IndexMap<String, Node>),
    /// Ordered list
    Sequence(Vec<Node>),
}

impl Node {
    /// Convert a parsed YAML value
    #[must_use]
    pub fn from_yaml(value: &Value) -> Self {
        match value {
            Value::Null => Self::Scalar(Scalar::Null),
            Value::Bool(b) => Self::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => Self::Scalar(Scalar::Number(n.to_string())),
            Value::String(s) => Self::Scalar(Scalar::String(s.clone())),
            Value::Sequence(items) => Self::Sequence(items.iter().map(Self::from_yaml).collect()),
            Value::Mapping(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (key_text(k), Self::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }

    /// Shape of this node
    #[inline]
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Scalar(_) => Shape::Scalar,
            Self::Mapping(_) => Shape::Mapping,
            Self::Sequence(_) => Shape::Sequence,
        }
    }

    /// Mapping contents, if this is a mapping
    #[inline]
    #[must_use]
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Sequence contents, if this is a sequence
    #[inline]
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Value under `key`, if this is a mapping containing it
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Check for a null scalar
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    /// Equality that also requires identical key order in every mapping
    #[must_use]
    pub fn ordered_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ordered_eq(y))
            }
            (Self::Mapping(a), Self::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.ordered_eq(vb))
            }
            _ => false,
        }
    }

    /// Rename the key `from` of the mapping found at `segments`, keeping its position
    ///
    /// Returns `false` when the path does not lead to a mapping holding `from`.
    pub fn rename_key(&mut self, segments: &[Segment], from: &str, to: &str) -> bool {
        let Some(target) = self.descend_mut(segments) else {
            return false;
        };
        let Self::Mapping(map) = target else {
            return false;
        };
        let Some(index) = map.get_index_of(from) else {
            return false;
        };
        let renamed: IndexMap<String, Node> = map
            .drain(..)
            .enumerate()
            .map(|(i, (k, v))| if i == index { (to.to_string(), v) } else { (k, v) })
            .collect();
        *map = renamed;
        true
    }

    fn descend_mut(&mut self, segments: &[Segment]) -> Option<&mut Node> {
        let Some((first, rest)) = segments.split_first() else {
            return Some(self);
        };
        let child = match (self, first) {
            (Self::Mapping(map), Segment::Key(k)) => map.get_mut(k)?,
            (Self::Sequence(items), Segment::Index(i)) => items.get_mut(*i)?,
            _ => return None,
        };
        child.descend_mut(rest)
    }
}

/// One step of a path through a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Segment {
    /// Mapping key
    Key(String),
    /// Sequence position
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Position of a node: document index within the stream plus segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodePath {
    /// Index of the YAML document in the stream
    pub document: usize,
    /// Steps from the document root
    pub segments: Vec<Segment>,
}

impl NodePath {
    /// Root of a document
    #[inline]
    #[must_use]
    pub fn root(document: usize) -> Self {
        Self {
            document,
            segments: Vec::new(),
        }
    }

    /// Path extended by a mapping key
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Key(key.into()));
        next
    }

    /// Path extended by a sequence index
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Index(index));
        next
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc{}", self.document)?;
        for segment in &self.segments {
            match segment {
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

/// Text form of a mapping key
fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "~".to_string(),
        Value::Tagged(tagged) => key_text(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
