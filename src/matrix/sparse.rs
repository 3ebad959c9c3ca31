//! Sparse column-ordered matrix.

use std::collections::BTreeMap;

use crate::util::Element;

/// Sparse matrix: one ordered row→value map per column.
///
/// Exact zeros are never stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseMatrix<T: Element> {
    rows: usize,
    data: Vec<BTreeMap<usize, T>>,
}

impl<T: Element> SparseMatrix<T> {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, data: vec![BTreeMap::new(); columns] }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.data.len()
    }

    /// Grow the dimensions to include (row, column).
    pub fn reserve(&mut self, row: usize, column: usize) {
        self.rows = self.rows.max(row.saturating_add(1));
        if column >= self.data.len() {
            self.data.resize_with(column.saturating_add(1), BTreeMap::new);
        }
    }

    /// Store a value, growing as needed. Storing zero removes any entry.
    pub fn set(&mut self, row: usize, column: usize, value: T) {
        self.reserve(row, column);
        if value.is_zero() {
            self.data[column].remove(&row);
        } else {
            self.data[column].insert(row, value);
        }
    }

    #[inline]
    pub fn get(&self, row: usize, column: usize) -> T {
        self.data
            .get(column)
            .and_then(|c| c.get(&row))
            .copied()
            .unwrap_or_default()
    }

    /// Number of stored entries.
    pub fn stored(&self) -> usize {
        self.data.iter().map(BTreeMap::len).sum()
    }

    pub(super) fn column_data(&self) -> &[BTreeMap<usize, T>] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut m = SparseMatrix::<f64>::new(0, 0);
        m.set(3, 1, 2.5);
        m.set(0, 4, 0.0);
        assert_eq!((m.rows(), m.columns()), (4, 5));
        assert_eq!(m.get(3, 1), 2.5);
        assert_eq!(m.get(0, 4), 0.0);
        assert_eq!(m.stored(), 1);
    }

    #[test]
    fn test_zero_removes() {
        let mut m = SparseMatrix::<i32>::new(2, 2);
        m.set(1, 1, 7);
        m.set(1, 1, 0);
        assert_eq!(m.stored(), 0);
    }
}
