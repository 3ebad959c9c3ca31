//! M document holder: a parsed tree plus typed queries over it.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use super::node::MNode;
use crate::core::Holder;
use crate::fixedpoint;
use crate::matrix::{DenseMatrix, MatrixLoader};
use crate::util::{Error, Result};

/// Largest matrix built from a document subtree.
const MAX_MATRIX_CELLS: usize = 1 << 24;

/// Read-only view of one M document, keyed by file name in the registry.
pub struct MDocument {
    name: String,
    root: MNode,
    /// Matrices built from subtrees, by path.
    matrices: HashMap<Vec<String>, DenseMatrix<f64>>,
}

impl MDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Self::parse(path.to_string_lossy(), &text)
    }

    /// Open a file, or log and behave as an empty document.
    pub fn open_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::open(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "document unavailable, reading as empty");
            Self::from_node(path.to_string_lossy(), MNode::new())
        })
    }

    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let root = MNode::parse(text)?;
        let doc = Self::from_node(name, root);
        debug!(document = %doc.name, keys = doc.root.len(), "parsed");
        Ok(doc)
    }

    pub fn from_node(name: impl Into<String>, root: MNode) -> Self {
        Self { name: name.into(), root, matrices: HashMap::new() }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root(&self) -> &MNode {
        &self.root
    }

    /// Numeric value at `path`; 0 when missing or not a number.
    pub fn get(&self, path: &[&str]) -> f64 {
        self.get_string(path).trim().parse().unwrap_or(0.0)
    }

    /// Value at `path` encoded as fixed point.
    pub fn get_fixed(&self, path: &[&str], exponent: i32) -> i32 {
        fixedpoint::encode(self.get_string(path), exponent)
    }

    /// Raw value at `path`; empty when missing.
    pub fn get_string(&self, path: &[&str]) -> &str {
        self.root.get(path).and_then(MNode::value).unwrap_or("")
    }

    /// Child keys of the node at `path`, in document order.
    pub fn keys(&self, path: &[&str]) -> Vec<String> {
        self.root
            .get(path)
            .map(|node| node.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn child_count(&self, path: &[&str]) -> usize {
        self.root.get(path).map_or(0, MNode::len)
    }

    /// Matrix stored at `path`, built once and cached.
    ///
    /// A node with a value is read as matrix text. Otherwise numbered
    /// children are rows, each holding numbered children or a value of
    /// whitespace/comma separated numbers. Anything else is the 1x1 zero.
    pub fn matrix(&mut self, path: &[&str]) -> &DenseMatrix<f64> {
        let key: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        let root = &self.root;
        let name = &self.name;
        self.matrices.entry(key).or_insert_with(|| {
            build_matrix(root.get(path)).unwrap_or_else(|| {
                debug!(document = %name, path = ?path, "no matrix at path");
                DenseMatrix::zeros(1, 1)
            })
        })
    }
}

impl Holder for MDocument {}

fn build_matrix(node: Option<&MNode>) -> Option<DenseMatrix<f64>> {
    let node = node?;
    if let Some(text) = node.value().filter(|v| !v.trim().is_empty()) {
        return MatrixLoader::parse_str::<f64>(text, 0).ok().map(|m| m.to_dense());
    }

    let mut cells: Vec<(usize, usize, f64)> = Vec::new();
    let (mut rows, mut columns) = (0usize, 0usize);
    for (row_key, row) in node.iter() {
        let Some(r) = index_key(row_key) else { continue };
        rows = rows.max(r + 1);
        if row.is_empty() {
            let text = row.value().unwrap_or("");
            let values = text.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
            for (c, value) in values.enumerate() {
                columns = columns.max(c + 1);
                cells.push((r, c, value.parse().unwrap_or(0.0)));
            }
        } else {
            for (column_key, cell) in row.iter() {
                let Some(c) = index_key(column_key) else { continue };
                columns = columns.max(c + 1);
                cells.push((r, c, cell.value().and_then(|v| v.trim().parse().ok()).unwrap_or(0.0)));
            }
        }
    }

    let size = rows.checked_mul(columns)?;
    if size == 0 || size > MAX_MATRIX_CELLS {
        return None;
    }
    let mut matrix = DenseMatrix::zeros(rows, columns);
    for (r, c, v) in cells {
        matrix.set(r, c, v);
    }
    Some(matrix)
}

fn index_key(key: &str) -> Option<usize> {
    key.parse::<usize>().ok().filter(|&i| i < MAX_MATRIX_CELLS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "N2A.schema=3\n\
                        gain:2.5\n\
                        label:soma\n\
                        weights\n 0:1 2\n 1:3,4\n\
                        grid\n 1\n  0:5\n  2:6\n\
                        inline:[1 0; 0 1]\n";

    #[test]
    fn test_typed_queries() {
        let doc = MDocument::parse("doc", TEXT).unwrap();
        assert_eq!(doc.get(&["gain"]), 2.5);
        assert_eq!(doc.get(&["label"]), 0.0);
        assert_eq!(doc.get(&["missing"]), 0.0);
        assert_eq!(doc.get_string(&["label"]), "soma");
        assert_eq!(doc.get_string(&["missing", "deeper"]), "");
        assert_eq!(doc.get_fixed(&["gain"], 1), fixedpoint::encode_f64(2.5, 1));
        assert_eq!(doc.keys(&["weights"]), vec!["0", "1"]);
        assert_eq!(doc.child_count(&[]), 5);
        assert_eq!(doc.child_count(&["nothing"]), 0);
    }

    #[test]
    fn test_matrix_from_rows() {
        let mut doc = MDocument::parse("doc", TEXT).unwrap();
        let m = doc.matrix(&["weights"]).clone();
        assert_eq!((m.rows(), m.columns()), (2, 2));
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0]);

        let grid = doc.matrix(&["grid"]);
        assert_eq!((grid.rows(), grid.columns()), (2, 3));
        assert_eq!(grid.get(1, 0), 5.0);
        assert_eq!(grid.get(1, 2), 6.0);
        assert_eq!(grid.get(0, 0), 0.0);
    }

    #[test]
    fn test_matrix_from_value_and_fallback() {
        let mut doc = MDocument::parse("doc", TEXT).unwrap();
        let inline = doc.matrix(&["inline"]);
        assert_eq!(inline.get(1, 1), 1.0);
        assert_eq!(inline.get(0, 1), 0.0);

        let missing = doc.matrix(&["missing"]);
        assert_eq!((missing.rows(), missing.columns()), (1, 1));
        assert_eq!(missing.get(0, 0), 0.0);
    }

    #[test]
    fn test_matrix_ignores_huge_indices() {
        let text = format!("big\n {}:1\n 0:2\n", usize::MAX);
        let mut doc = MDocument::parse("doc", &text).unwrap();
        let m = doc.matrix(&["big"]);
        assert_eq!((m.rows(), m.columns()), (1, 1));
        assert_eq!(m.get(0, 0), 2.0);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MDocument::open("no/such/doc.n2a"),
            Err(Error::FileNotFound(_))
        ));
        let doc = MDocument::open_or_empty("no/such/doc.n2a");
        assert!(doc.root().is_empty());
        assert_eq!(doc.get(&["x"]), 0.0);
    }
}
