//! Normalized test-plan documents
//!
//! A test plan is parsed once into a [`Node`] tree whose maps keep their
//! source order and whose leaves carry a type tag. The [`LineIndex`] maps
//! field paths (`hardware.machines[1].name`) back to 1-indexed source lines
//! so that diagnostics can point at the offending line.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Default maximum nesting depth accepted by the tolerant parse
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default maximum number of nodes accepted by the tolerant parse
pub const DEFAULT_MAX_NODES: usize = 100_000;

/// Structural bounds applied while normalizing a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLimits {
    /// Maximum nesting depth (root is depth 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of nodes in the tree
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_nodes() -> usize {
    DEFAULT_MAX_NODES
}

impl Default for DocumentLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// Type tag of a normalized node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// `null` or `~`
    Null,
    /// `true` / `false`
    Boolean,
    /// Integral number
    Integer,
    /// Floating point number
    Float,
    /// Any string scalar
    String,
    /// Sequence
    List,
    /// Mapping
    Map,
}

impl NodeKind {
    /// Lowercase name used in diagnostics and type errors
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the normalized document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Sequence of nodes
    List(Vec<Node>),
    /// Mapping with keys in source order
    Map(Vec<(String, Node)>),
}

impl Node {
    /// Type tag of this node
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Null => NodeKind::Null,
            Self::Boolean(_) => NodeKind::Boolean,
            Self::Integer(_) => NodeKind::Integer,
            Self::Float(_) => NodeKind::Float,
            Self::String(_) => NodeKind::String,
            Self::List(_) => NodeKind::List,
            Self::Map(_) => NodeKind::Map,
        }
    }

    /// Check for null
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check for a scalar (anything but list and map)
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Borrow a string scalar
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form of a non-null scalar.
    ///
    /// YAML readily turns `6.1` or `2024` into numbers, so callers that want
    /// an identifier accept any scalar here.
    #[must_use]
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Borrow list elements
    #[must_use]
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow map entries
    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, Node)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a key in a map node
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Convert back to a YAML value (for display)
    #[must_use]
    pub fn to_yaml_value(&self) -> serde_yaml::Value {
        use serde_yaml::Value;
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Float(f) => Value::Number((*f).into()),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Sequence(items.iter().map(Self::to_yaml_value).collect()),
            Self::Map(entries) => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_yaml_value()))
                    .collect(),
            ),
        }
    }
}

/// Failure to build a normalized document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Text is empty or contains only comments
    Empty,
    /// YAML grammar violation reported by the parser
    Syntax {
        /// Parser message
        message: String,
        /// 1-indexed line, when the parser knows it
        line: Option<usize>,
    },
    /// Nesting exceeds [`DocumentLimits::max_depth`]
    TooDeep {
        /// Configured limit
        limit: usize,
        /// Path where the limit was crossed
        path: String,
    },
    /// Node count exceeds [`DocumentLimits::max_nodes`]
    TooLarge {
        /// Configured limit
        limit: usize,
    },
    /// A mapping key is itself a list or map
    UnsupportedKey {
        /// Path of the mapping holding the key
        path: String,
    },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "document is empty"),
            Self::Syntax { message, .. } => write!(f, "{message}"),
            Self::TooDeep { limit, path } => {
                write!(f, "document nesting exceeds {limit} levels at '{path}'")
            }
            Self::TooLarge { limit } => write!(f, "document exceeds {limit} nodes"),
            Self::UnsupportedKey { path } => {
                let at = if path.is_empty() { "<root>" } else { path };
                write!(f, "mapping keys must be scalars (in '{at}')")
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

/// One segment of a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Map key
    Key(String),
    /// Concrete list index (`[3]`)
    Index(usize),
    /// Every list element (`[]`)
    Each,
}

/// Split a dotted field path into segments.
///
/// `test_suites[].name` → `[Key("test_suites"), Each, Key("name")]`.
#[must_use]
pub fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.').filter(|p| !p.is_empty()) {
        let (key, mut brackets) = part.find('[').map_or((part, ""), |pos| part.split_at(pos));
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        while let Some(rest) = brackets.strip_prefix('[') {
            let Some(close) = rest.find(']') else {
                break;
            };
            let inner = &rest[..close];
            if inner.is_empty() {
                segments.push(Segment::Each);
            } else if let Ok(index) = inner.parse() {
                segments.push(Segment::Index(index));
            }
            brackets = &rest[close + 1..];
        }
    }
    segments
}

/// Append a key to a path
#[must_use]
pub fn join_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Replace concrete list indices with `[]` (`a[3].b` → `a[].b`)
#[must_use]
pub fn generalize_path(path: &str) -> String {
    static INDEX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\[\d+\]").unwrap()
    });
    INDEX_REGEX.replace_all(path, "[]").into_owned()
}

/// A path resolved against a document
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// Concrete path (indices filled in)
    pub path: String,
    /// Node at the path; `None` when the path does not exist
    pub node: Option<&'a Node>,
}

/// Parsed test-plan document. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    root: Node,
    lines: LineIndex,
}

impl NormalizedDocument {
    /// Parse with the default [`DocumentLimits`]
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty, is not valid YAML, or exceeds
    /// the structural limits.
    pub fn parse(text: &str) -> Result<Self, NormalizeError> {
        Self::parse_with_limits(text, DocumentLimits::default())
    }

    /// Parse with explicit limits
    ///
    /// # Errors
    ///
    /// Returns an error if the text is empty, is not valid YAML, or exceeds
    /// the structural limits.
    pub fn parse_with_limits(text: &str, limits: DocumentLimits) -> Result<Self, NormalizeError> {
        if text.trim().is_empty() {
            return Err(NormalizeError::Empty);
        }
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| NormalizeError::Syntax {
                message: e.to_string(),
                line: e.location().map(|loc| loc.line()),
            })?;
        if value.is_null() {
            return Err(NormalizeError::Empty);
        }

        let mut builder = TreeBuilder { limits, nodes: 0 };
        let root = builder.convert(&value, "", 0)?;
        Ok(Self {
            root,
            lines: LineIndex::build(text),
        })
    }

    /// Root node
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Source line index
    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    /// Look up a concrete path (no `[]` segments)
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut node = &self.root;
        for segment in parse_path(path) {
            node = match segment {
                Segment::Key(key) => node.get(&key)?,
                Segment::Index(i) => node.as_list()?.get(i)?,
                Segment::Each => return None,
            };
        }
        Some(node)
    }

    /// Non-null node at a concrete path
    #[must_use]
    pub fn get_present(&self, path: &str) -> Option<&Node> {
        self.get(path).filter(|n| !n.is_null())
    }

    /// Scalar text at a concrete path.
    ///
    /// Floats keep their source spelling when [`Self::float_literal`]
    /// recovers it, so `6.10` stays `6.10` rather than `6.1`.
    #[must_use]
    pub fn text(&self, path: &str) -> Option<String> {
        self.float_literal(path)
            .map(str::to_string)
            .or_else(|| self.get(path).and_then(Node::scalar_text))
    }

    /// Source spelling of a float at a concrete path.
    ///
    /// Only block-style values are recovered, and only when the spelling
    /// reads back as the parsed value.
    #[must_use]
    pub fn float_literal(&self, path: &str) -> Option<&str> {
        let Node::Float(value) = self.get(path)? else {
            return None;
        };
        self.lines
            .literal(path)
            .filter(|raw| raw.parse::<f64>().is_ok_and(|parsed| parsed == *value))
    }

    /// Resolve a path that may contain `[]`.
    ///
    /// `[]` expands to one entry per list element, in element order. When the
    /// list is absent, empty or not a list, the expansion yields no entries.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Vec<Resolved<'_>> {
        let mut current = vec![Resolved {
            path: String::new(),
            node: Some(&self.root),
        }];
        for segment in parse_path(path) {
            let mut next = Vec::with_capacity(current.len());
            for entry in current {
                match &segment {
                    Segment::Key(key) => next.push(Resolved {
                        path: join_key(&entry.path, key),
                        node: entry.node.and_then(|n| n.get(key)),
                    }),
                    Segment::Index(i) => next.push(Resolved {
                        path: format!("{}[{i}]", entry.path),
                        node: entry.node.and_then(Node::as_list).and_then(|l| l.get(*i)),
                    }),
                    Segment::Each => {
                        if let Some(items) = entry.node.and_then(Node::as_list) {
                            next.extend(items.iter().enumerate().map(|(i, item)| Resolved {
                                path: format!("{}[{i}]", entry.path),
                                node: Some(item),
                            }));
                        }
                    }
                }
            }
            current = next;
        }
        current
    }

    /// Line where a concrete path is declared
    #[must_use]
    pub fn line_of(&self, path: &str) -> Option<usize> {
        self.lines.line_of(path)
    }

    /// Line of the path or of its closest declared ancestor
    #[must_use]
    pub fn nearest_line(&self, path: &str) -> Option<usize> {
        self.lines.nearest_line(path)
    }
}

struct TreeBuilder {
    limits: DocumentLimits,
    nodes: usize,
}

impl TreeBuilder {
    fn convert(
        &mut self,
        value: &serde_yaml::Value,
        path: &str,
        depth: usize,
    ) -> Result<Node, NormalizeError> {
        use serde_yaml::Value;

        if let Value::Tagged(tagged) = value {
            return self.convert(&tagged.value, path, depth);
        }
        if depth > self.limits.max_depth {
            return Err(NormalizeError::TooDeep {
                limit: self.limits.max_depth,
                path: path.to_string(),
            });
        }
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(NormalizeError::TooLarge {
                limit: self.limits.max_nodes,
            });
        }

        Ok(match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Integer(i),
                None => Node::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Node::String(s.clone()),
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.convert(item, &format!("{path}[{i}]"), depth + 1)?);
                }
                Node::List(out)
            }
            Value::Mapping(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, item) in map {
                    let key = key_text(key).ok_or_else(|| NormalizeError::UnsupportedKey {
                        path: path.to_string(),
                    })?;
                    let child = join_key(path, &key);
                    let node = self.convert(item, &child, depth + 1)?;
                    entries.push((key, node));
                }
                Node::Map(entries)
            }
            Value::Tagged(_) => Node::Null,
        })
    }
}

fn key_text(key: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Tagged(tagged) => key_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

// ── Line index ─────────────────────────────────────────────────────────────
//
// Block-style YAML only: keys are recognized per line and nested by column.
// Flow collections record the line of their owning key; lookups inside them
// fall back to that key through `nearest_line`.

static KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(
        r#"^(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<plain>[A-Za-z0-9_$][^:#]*?))\s*:(?:\s|$)"#,
    )
    .unwrap()
});

#[derive(Debug)]
struct Frame {
    col: usize,
    path: String,
    is_key: bool,
    next_item: usize,
}

fn plain_literal(value: &str) -> Option<&str> {
    let value = value.split(" #").next().unwrap_or(value).trim();
    let first = value.chars().next()?;
    if "|>{[\"'&*!#".contains(first) {
        return None;
    }
    Some(value)
}

/// Maps concrete field paths to the 1-indexed line declaring them, and to
/// the plain scalar written on that line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    lines: HashMap<String, usize>,
    literals: HashMap<String, String>,
}

impl LineIndex {
    /// Scan source text
    #[must_use]
    pub fn build(text: &str) -> Self {
        let mut lines = HashMap::new();
        let mut literals = HashMap::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut root_items = 0usize;
        let mut block_scalar: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            let content = raw[indent..].trim_end();

            if let Some(owner_col) = block_scalar {
                if content.is_empty() || indent > owner_col {
                    continue;
                }
                block_scalar = None;
            }
            if content.is_empty()
                || content.starts_with('#')
                || content == "---"
                || content == "..."
            {
                continue;
            }

            let mut col = indent;
            let mut content = content;
            let mut item_path: Option<String> = None;

            while content == "-" || content.starts_with("- ") {
                while stack.last().is_some_and(|top| top.col > col) {
                    stack.pop();
                }
                let (owner, index) = match stack.last_mut() {
                    Some(top) => {
                        let index = top.next_item;
                        top.next_item += 1;
                        (top.path.clone(), index)
                    }
                    None => {
                        root_items += 1;
                        (String::new(), root_items - 1)
                    }
                };
                let path = format!("{owner}[{index}]");
                lines.entry(path.clone()).or_insert(line_no);

                let after = &content[1..];
                let trimmed = after.trim_start();
                col += 1 + (after.len() - trimmed.len());
                content = trimmed;
                item_path = Some(path.clone());
                stack.push(Frame {
                    col,
                    path,
                    is_key: false,
                    next_item: 0,
                });
            }

            let Some(caps) = KEY_REGEX.captures(content) else {
                if let (Some(path), Some(raw)) = (item_path, plain_literal(content)) {
                    literals.entry(path).or_insert_with(|| raw.to_string());
                }
                continue;
            };
            let key = caps
                .name("dq")
                .or_else(|| caps.name("sq"))
                .or_else(|| caps.name("plain"))
                .map_or("", |m| m.as_str().trim());

            while stack
                .last()
                .is_some_and(|top| top.col > col || (top.is_key && top.col == col))
            {
                stack.pop();
            }
            let parent = stack.last().map_or("", |f| f.path.as_str());
            let path = join_key(parent, key);
            lines.entry(path.clone()).or_insert(line_no);

            let value = content[caps.get(0).map_or(content.len(), |m| m.end())..].trim_start();
            if value.starts_with('|') || value.starts_with('>') {
                block_scalar = Some(col);
            }
            if let Some(raw) = plain_literal(value) {
                literals.entry(path.clone()).or_insert_with(|| raw.to_string());
            }
            stack.push(Frame {
                col,
                path,
                is_key: true,
                next_item: 0,
            });
        }

        Self { lines, literals }
    }

    /// Plain scalar written after the key or dash declaring this path
    #[must_use]
    pub fn literal(&self, path: &str) -> Option<&str> {
        self.literals.get(path).map(String::as_str)
    }

    /// Line declaring exactly this path
    #[must_use]
    pub fn line_of(&self, path: &str) -> Option<usize> {
        self.lines.get(path).copied()
    }

    /// Line of the path or of its closest declared ancestor
    #[must_use]
    pub fn nearest_line(&self, path: &str) -> Option<usize> {
        let mut current = path;
        loop {
            if let Some(line) = self.lines.get(current) {
                return Some(*line);
            }
            let cut = current.rfind(['.', '['])?;
            current = &current[..cut];
            if current.is_empty() {
                return None;
            }
        }
    }

    /// Number of indexed paths
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check whether nothing was indexed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"# plan
metadata:
  plan_name: "GPU smoke"
  test_type: smoke
hardware:
  cpu: Intel Xeon 8380
  machines:
    - name: node-01
      specs:
        cpu: Intel Xeon 8380
    - name: node-02
environment:
  os: [ubuntu-22.04, rhel-9]
  kernel:
    version: 6.1
notes: |
  free text
  name: not a key
test_suites:
- name: boot
  order: 1
- name: memory
  order: 2
"#;

    #[test]
    fn test_parse_kinds() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        assert_eq!(doc.root().kind(), NodeKind::Map);
        assert_eq!(doc.get("metadata.test_type").map(Node::kind), Some(NodeKind::String));
        assert_eq!(doc.get("environment.kernel.version").map(Node::kind), Some(NodeKind::Float));
        assert_eq!(doc.get("test_suites[1].order"), Some(&Node::Integer(2)));
        assert_eq!(doc.get("environment.os").map(Node::kind), Some(NodeKind::List));
    }

    #[test]
    fn test_map_keeps_source_order() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        let keys: Vec<&str> = doc
            .root()
            .as_map()
            .expect("map")
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(
            keys,
            vec!["metadata", "hardware", "environment", "notes", "test_suites"]
        );
    }

    #[test]
    fn test_scalar_text_accepts_numbers() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        assert_eq!(doc.text("environment.kernel.version").as_deref(), Some("6.1"));
        assert_eq!(doc.text("hardware"), None);
    }

    #[test]
    fn test_float_keeps_source_spelling() {
        let doc = NormalizedDocument::parse(
            "kernel:\n  version: 6.10   # trailing\n  min_version: 5.20\nos:\n  - 22.10\nflow: {v: 6.10}\n",
        )
        .expect("parse");
        assert_eq!(doc.text("kernel.version").as_deref(), Some("6.10"));
        assert_eq!(doc.float_literal("kernel.min_version"), Some("5.20"));
        assert_eq!(doc.text("os[0]").as_deref(), Some("22.10"));
        assert_eq!(doc.float_literal("flow.v"), None);
        assert_eq!(doc.text("flow.v").as_deref(), Some("6.1"));
        assert_eq!(doc.float_literal("os"), None);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(NormalizedDocument::parse("  \n"), Err(NormalizeError::Empty));
        assert_eq!(NormalizedDocument::parse("# only a comment\n"), Err(NormalizeError::Empty));
    }

    #[test]
    fn test_syntax_error_has_line() {
        let text = "metadata:\n  plan_name: x\n   test_type: smoke\n";
        match NormalizedDocument::parse(text) {
            Err(NormalizeError::Syntax { line, .. }) => assert_eq!(line, Some(3)),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_depth_limit() {
        let limits = DocumentLimits {
            max_depth: 2,
            max_nodes: 100,
        };
        let err = NormalizedDocument::parse_with_limits("a:\n  b:\n    c: 1\n", limits)
            .expect_err("too deep");
        assert!(matches!(err, NormalizeError::TooDeep { limit: 2, .. }));
        assert!(err.to_string().contains("a.b.c"));
    }

    #[test]
    fn test_node_limit() {
        let limits = DocumentLimits {
            max_depth: 8,
            max_nodes: 3,
        };
        let err = NormalizedDocument::parse_with_limits("a: [1, 2, 3]\n", limits)
            .expect_err("too large");
        assert_eq!(err, NormalizeError::TooLarge { limit: 3 });
    }

    #[test]
    fn test_complex_key_rejected() {
        let err = NormalizedDocument::parse("? [a, b]\n: 1\n").expect_err("complex key");
        assert!(matches!(err, NormalizeError::UnsupportedKey { .. }));
    }

    #[test]
    fn test_tagged_values_are_unwrapped() {
        let doc = NormalizedDocument::parse("cpu: !model Intel Xeon 8380\n").expect("parse");
        assert_eq!(doc.text("cpu").as_deref(), Some("Intel Xeon 8380"));
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("test_suites[].name"),
            vec![
                Segment::Key("test_suites".into()),
                Segment::Each,
                Segment::Key("name".into())
            ]
        );
        assert_eq!(
            parse_path("a[2][0].b"),
            vec![
                Segment::Key("a".into()),
                Segment::Index(2),
                Segment::Index(0),
                Segment::Key("b".into())
            ]
        );
    }

    #[test]
    fn test_generalize_path() {
        assert_eq!(generalize_path("a[3].b[10].c"), "a[].b[].c");
        assert_eq!(generalize_path("a.b"), "a.b");
    }

    #[test]
    fn test_resolve_each() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        let resolved = doc.resolve("hardware.machines[].specs.cpu");
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].path, "hardware.machines[0].specs.cpu");
        assert!(resolved[0].node.is_some());
        assert_eq!(resolved[1].path, "hardware.machines[1].specs.cpu");
        assert!(resolved[1].node.is_none());
    }

    #[test]
    fn test_resolve_each_over_missing_list() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        assert!(doc.resolve("firmware.items[].name").is_empty());
        let plain = doc.resolve("firmware.gpu_version");
        assert_eq!(plain.len(), 1);
        assert!(plain[0].node.is_none());
    }

    #[test]
    fn test_line_index_keys() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        assert_eq!(doc.line_of("metadata"), Some(2));
        assert_eq!(doc.line_of("metadata.test_type"), Some(4));
        assert_eq!(doc.line_of("hardware.machines[0]"), Some(8));
        assert_eq!(doc.line_of("hardware.machines[0].name"), Some(8));
        assert_eq!(doc.line_of("hardware.machines[0].specs.cpu"), Some(10));
        assert_eq!(doc.line_of("hardware.machines[1].name"), Some(11));
        assert_eq!(doc.line_of("environment.kernel.version"), Some(15));
    }

    #[test]
    fn test_line_index_compact_sequence() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        assert_eq!(doc.line_of("test_suites"), Some(19));
        assert_eq!(doc.line_of("test_suites[0].name"), Some(20));
        assert_eq!(doc.line_of("test_suites[0].order"), Some(21));
        assert_eq!(doc.line_of("test_suites[1].order"), Some(23));
    }

    #[test]
    fn test_line_index_skips_block_scalars() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        assert_eq!(doc.line_of("notes"), Some(16));
        assert_eq!(doc.line_of("notes.name"), None);
    }

    #[test]
    fn test_nearest_line_falls_back_to_ancestor() {
        let doc = NormalizedDocument::parse(PLAN).expect("parse");
        assert_eq!(doc.nearest_line("environment.os[1]"), Some(13));
        assert_eq!(doc.nearest_line("hardware.machines[1].specs"), Some(11));
        assert_eq!(doc.nearest_line("firmware.gpu_version"), None);
    }

    #[test]
    fn test_line_index_nested_sequences() {
        let index = LineIndex::build("- - a\n  - b\n- c\n");
        assert_eq!(index.line_of("[0]"), Some(1));
        assert_eq!(index.line_of("[0][0]"), Some(1));
        assert_eq!(index.line_of("[0][1]"), Some(2));
        assert_eq!(index.line_of("[1]"), Some(3));
    }

    #[test]
    fn test_to_yaml_value_roundtrip_shape() {
        let doc = NormalizedDocument::parse("a: 1\nb: [x, y]\n").expect("parse");
        let value = doc.root().to_yaml_value();
        assert_eq!(value["a"], serde_yaml::Value::Number(1.into()));
        assert_eq!(value["b"][1], serde_yaml::Value::String("y".into()));
    }
}
