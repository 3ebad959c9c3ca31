//! Hierarchical key/value tree and its indented text form.
//!
//! ```text
//! N2A.schema=3
//! layer
//!  size:3
//!  weights
//!   0:1 2 3
//!   1:4 5 6
//! note:|
//!  first line
//!  second line
//! ```
//!
//! One leading space per level. A value of `|` starts a block whose lines are
//! indented one level deeper than the key. Keys that contain `:` or start
//! with `"` are quoted, with inner quotes doubled.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::util::{Error, Result};

/// Version tag written on the first line.
pub const DOCUMENT_VERSION_TAG: &str = "N2A.schema=3";

const BLOCK_MARKER: &str = "|";

/// Child key. Numeric keys sort before the rest, by value.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Key(String);

impl Key {
    fn number(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.number(), other.number()) {
            (Some(a), Some(b)) => a.total_cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A node with an optional value and ordered children.
#[derive(Clone, Default, PartialEq)]
pub struct MNode {
    value: Option<String>,
    children: BTreeMap<Key, MNode>,
}

impl MNode {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn child(&self, key: &str) -> Option<&MNode> {
        self.children.get(&Key(key.to_string()))
    }

    /// Node at `path` below this one. An empty path is this node.
    pub fn get(&self, path: &[&str]) -> Option<&MNode> {
        path.iter().try_fold(self, |node, key| node.child(key))
    }

    /// Node at `path`, created along with any missing ancestors.
    pub fn entry<S: AsRef<str>>(&mut self, path: &[S]) -> &mut MNode {
        path.iter().fold(self, |node, key| {
            node.children.entry(Key(key.as_ref().to_string())).or_default()
        })
    }

    /// Set the value at `path`, creating nodes as needed.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<String>) {
        self.entry(path).set_value(value);
    }

    /// Child keys in order: numbers by value, then the rest lexically.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(|k| k.0.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MNode)> {
        self.children.iter().map(|(k, v)| (k.0.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Parse document text. A leading `N2A.schema=` line is optional.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();
        let mut root = Self::new();
        // (indent, key) of the open ancestors
        let mut stack: Vec<(usize, String)> = Vec::new();
        let mut first = true;
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            i += 1;
            if line.trim().is_empty() {
                continue;
            }
            if std::mem::take(&mut first) && line.starts_with("N2A.schema=") {
                continue;
            }

            let indent = indent_of(line);
            let (key, value) = split_key(&line[indent..])?;
            let value = match value {
                Some(BLOCK_MARKER) => {
                    let mut block = Vec::new();
                    while i < lines.len() {
                        let next = lines[i];
                        if !next.trim().is_empty() && indent_of(next) <= indent {
                            break;
                        }
                        block.push(next.get(indent + 1..).unwrap_or(""));
                        i += 1;
                    }
                    while block.last().is_some_and(|l| l.is_empty()) {
                        block.pop();
                    }
                    Some(block.join("\n"))
                }
                other => other.map(str::to_string),
            };

            while stack.last().is_some_and(|(d, _)| *d >= indent) {
                stack.pop();
            }
            let mut path: Vec<&str> = stack.iter().map(|(_, k)| k.as_str()).collect();
            path.push(&key);
            let node = root.entry(&path);
            if let Some(value) = value {
                node.value = Some(value);
            }
            stack.push((indent, key));
        }
        Ok(root)
    }

    /// Text form with the version tag, parseable by [`MNode::parse`].
    pub fn render(&self) -> String {
        let mut out = String::from(DOCUMENT_VERSION_TAG);
        out.push('\n');
        for (key, child) in self.iter() {
            child.render_into(&mut out, key, 0);
        }
        out
    }

    fn render_into(&self, out: &mut String, key: &str, depth: usize) {
        let pad = " ".repeat(depth);
        out.push_str(&pad);
        out.push_str(&quote_key(key));
        match self.value() {
            None => {}
            Some(v) if v.contains('\n') || v == BLOCK_MARKER => {
                out.push(':');
                out.push_str(BLOCK_MARKER);
                for line in v.lines() {
                    out.push('\n');
                    out.push_str(&pad);
                    out.push(' ');
                    out.push_str(line);
                }
            }
            Some(v) => {
                out.push(':');
                out.push_str(v);
            }
        }
        out.push('\n');
        for (k, child) in self.iter() {
            child.render_into(out, k, depth + 1);
        }
    }
}

impl fmt::Debug for MNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        if let Some(v) = &self.value {
            map.entry(&"", v);
        }
        map.entries(self.iter()).finish()
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Split `key[:value]`, unquoting the key.
fn split_key(body: &str) -> Result<(String, Option<&str>)> {
    let Some(quoted) = body.strip_prefix('"') else {
        return Ok(match body.split_once(':') {
            Some((k, v)) => (k.to_string(), Some(v)),
            None => (body.to_string(), None),
        });
    };

    let mut key = String::new();
    let mut chars = quoted.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            key.push(c);
            continue;
        }
        if chars.peek().is_some_and(|&(_, n)| n == '"') {
            key.push('"');
            chars.next();
            continue;
        }
        let rest = &quoted[i + 1..];
        return Ok((key, rest.strip_prefix(':')));
    }
    Err(Error::InvalidDocument(format!("unterminated quoted key: {body}")))
}

fn quote_key(key: &str) -> String {
    if key.contains(':') || key.starts_with('"') || key.starts_with(' ') || key.is_empty() {
        format!("\"{}\"", key.replace('"', "\"\""))
    } else {
        key.to_string()
    }
}
