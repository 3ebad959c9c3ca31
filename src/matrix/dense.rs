//! Dense row-major matrix.

use crate::util::Element;

/// Dense matrix stored row-major with explicit dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix<T: Element> {
    rows: usize,
    columns: usize,
    data: Vec<T>,
}

impl<T: Element> DenseMatrix<T> {
    /// All-zero matrix.
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self { rows, columns, data: vec![T::default(); rows * columns] }
    }

    /// Wrap row-major data. Returns `None` if the length does not match.
    pub fn from_vec(rows: usize, columns: usize, data: Vec<T>) -> Option<Self> {
        (data.len() == rows * columns).then_some(Self { rows, columns, data })
    }

    /// Build from ragged rows, padding short rows with zeros.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Self {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut m = Self::zeros(rows.len(), columns);
        for (r, row) in rows.into_iter().enumerate() {
            let start = r * columns;
            m.data[start..start + row.len()].copy_from_slice(&row);
        }
        m
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Element at (row, column), or zero outside the bounds.
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> T {
        if row < self.rows && column < self.columns {
            self.data[row * self.columns + column]
        } else {
            T::default()
        }
    }

    /// Set an element. Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, row: usize, column: usize, value: T) {
        if row < self.rows && column < self.columns {
            self.data[row * self.columns + column] = value;
        }
    }

    /// Row-major backing storage.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.columns, self.rows);
        for r in 0..self.rows {
            for c in 0..self.columns {
                t.data[c * self.rows + r] = self.data[r * self.columns + c];
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_pads() {
        let m = DenseMatrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0]]);
        assert_eq!((m.rows(), m.columns()), (2, 3));
        assert_eq!(m.get(1, 0), 4.0);
        assert_eq!(m.get(1, 2), 0.0);
        assert_eq!(m.get(5, 5), 0.0);
    }

    #[test]
    fn test_transpose() {
        let m = DenseMatrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let t = m.transpose();
        assert_eq!((t.rows(), t.columns()), (3, 2));
        assert_eq!(t.as_slice(), &[1, 4, 2, 5, 3, 6]);
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        assert!(DenseMatrix::from_vec(2, 2, vec![1.0f64; 3]).is_none());
    }
}
