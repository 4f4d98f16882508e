//! Source positions of keys and sequence items
//!
//! Positions come from a span-tracking parse (`marked_yaml`) of each YAML
//! document in the stream. Every mapping key maps to the byte span of its
//! text and its 1-based line/column; every sequence item maps to the
//! line/column where its node starts. The value tree from `serde_yaml`
//! remains the source of truth and the outline is only consulted by path.
//!
//! A document the span parser does not accept (anchors, aliases, tags)
//! contributes no positions. The reason is kept as an [`OutlineGap`].

use super::node::NodePath;
use marked_yaml::{LoaderOptions, Marker, Node as Marked};
use std::collections::HashMap;

/// Where a key sits in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLocation {
    /// 1-based line
    pub line: usize,
    /// 1-based character column of the key token (quote included)
    pub column: usize,
    /// Byte offset of the key text (quote excluded)
    pub offset: usize,
    /// Byte length of the key text (quotes excluded)
    pub len: usize,
    /// Whether the key is written quoted
    pub quoted: bool,
}

/// Where a sequence item's node starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLocation {
    /// 1-based line
    pub line: usize,
    /// 1-based character column
    pub column: usize,
}

/// Document of the stream without source positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineGap {
    /// Index of the document in the stream
    pub document: usize,
    /// Why the span parser rejected it
    pub reason: String,
}

/// Key and item positions of a whole stream
#[derive(Debug, Clone, Default)]
pub struct Outline {
    keys: HashMap<NodePath, KeyLocation>,
    items: HashMap<NodePath, ItemLocation>,
    gaps: Vec<OutlineGap>,
}

impl Outline {
    /// Locate every key and item of `source`
    #[must_use]
    pub fn scan(source: &str) -> Self {
        let lines = LineIndex::new(source);
        let mut outline = Self::default();

        for (index, chunk) in split_documents(source).into_iter().enumerate() {
            let options = LoaderOptions::default().toplevel_sequence();
            match marked_yaml::parse_yaml_with_options(index, chunk.text, options) {
                Ok(root) => {
                    let mut visitor = Visitor {
                        outline: &mut outline,
                        lines: &lines,
                        first_line: chunk.first_line,
                    };
                    visitor.node(NodePath::root(index), &root);
                }
                Err(e) => {
                    tracing::debug!(document = index, error = %e, "no source positions for document");
                    outline.gaps.push(OutlineGap {
                        document: index,
                        reason: e.to_string(),
                    });
                }
            }
        }
        outline
    }

    /// Location of the key that ends `path`
    #[inline]
    #[must_use]
    pub fn key(&self, path: &NodePath) -> Option<&KeyLocation> {
        self.keys.get(path)
    }

    /// Location of the sequence item at `path`
    #[inline]
    #[must_use]
    pub fn item(&self, path: &NodePath) -> Option<&ItemLocation> {
        self.items.get(path)
    }

    /// Why a document has no positions, if it has none
    #[must_use]
    pub fn gap(&self, document: usize) -> Option<&OutlineGap> {
        self.gaps.iter().find(|g| g.document == document)
    }

    /// Number of located keys
    #[inline]
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

struct Visitor<'a> {
    outline: &'a mut Outline,
    lines: &'a LineIndex<'a>,
    /// 0-based line of the document's first line in the stream
    first_line: usize,
}

impl Visitor<'_> {
    fn node(&mut self, path: NodePath, node: &Marked) {
        match node {
            Marked::Mapping(map) => {
                for (key, value) in map.iter() {
                    let key_path = path.key(key.as_str());
                    if let Some(location) = key.span().start().and_then(|m| self.key(m, key.as_str())) {
                        self.outline.keys.insert(key_path.clone(), location);
                    }
                    self.node(key_path, value);
                }
            }
            Marked::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = path.index(i);
                    if let Some(start) = item.span().start() {
                        self.outline.items.insert(
                            item_path.clone(),
                            ItemLocation {
                                line: self.first_line + start.line(),
                                column: start.column(),
                            },
                        );
                    }
                    self.node(item_path, item);
                }
            }
            Marked::Scalar(_) => {}
        }
    }

    /// Byte span of a key whose token starts at `start`
    fn key(&self, start: &Marker, text: &str) -> Option<KeyLocation> {
        let line = self.first_line + start.line();
        let token = self.lines.offset(line, start.column())?;
        let quoted = matches!(self.lines.source.as_bytes().get(token), Some(b'"' | b'\''));
        let offset = if quoted { token + 1 } else { token };
        Some(KeyLocation {
            line,
            column: start.column(),
            offset,
            len: text.len(),
            quoted,
        })
    }
}

/// Byte offsets of line starts
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, starts }
    }

    /// Byte offset of the 1-based `column` on the 1-based `line`
    fn offset(&self, line: usize, column: usize) -> Option<usize> {
        let start = *self.starts.get(line.checked_sub(1)?)?;
        let end = self.starts.get(line).copied().unwrap_or(self.source.len());
        let text = self.source.get(start..end)?;
        text.char_indices()
            .nth(column.checked_sub(1)?)
            .map(|(i, _)| start + i)
    }
}

/// One YAML document of a stream
struct Chunk<'a> {
    text: &'a str,
    /// 0-based line of the chunk's first line
    first_line: usize,
}

/// Split a stream at `---` / `...` markers, counting documents the way the
/// value parser does: a chunk is a document when it opens with `---` or
/// holds content.
fn split_documents(source: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut first_line = 0;
    let mut explicit = false;
    let mut content = false;
    let mut offset = 0;

    for (number, raw) in source.split_inclusive('\n').enumerate() {
        let line = raw.trim_end_matches(['\n', '\r']);
        if is_marker(line, "---") {
            if explicit || content {
                chunks.push(Chunk {
                    text: &source[start..offset],
                    first_line,
                });
            }
            start = offset;
            first_line = number;
            explicit = true;
            content = false;
        } else if is_marker(line, "...") {
            if explicit || content {
                chunks.push(Chunk {
                    text: &source[start..offset + raw.len()],
                    first_line,
                });
            }
            start = offset + raw.len();
            first_line = number + 1;
            explicit = false;
            content = false;
        } else {
            let trimmed = line.trim_start();
            if !(trimmed.is_empty() || trimmed.starts_with('#') || line.starts_with('%')) {
                content = true;
            }
        }
        offset += raw.len();
    }
    if explicit || content {
        chunks.push(Chunk {
            text: &source[start..],
            first_line,
        });
    }
    chunks
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.strip_prefix(marker)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}
