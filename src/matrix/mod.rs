//! In-memory matrices loaded from text files.
//!
//! - [`DenseMatrix`] - row-major storage with explicit dimensions
//! - [`SparseMatrix`] - column-ordered row→value maps
//! - [`Matrix`] - closed variant over both, with a single nonzero iterator
//! - [`MatrixLoader`] - dense/sparse text parser

mod dense;
mod loader;
mod sparse;

pub use dense::DenseMatrix;
pub use loader::MatrixLoader;
pub use sparse::SparseMatrix;

use std::collections::btree_map;

use crate::util::Element;

/// A matrix in either storage form.
#[derive(Clone, Debug, PartialEq)]
pub enum Matrix<T: Element> {
    Dense(DenseMatrix<T>),
    Sparse(SparseMatrix<T>),
}

impl<T: Element> Matrix<T> {
    /// The 1×1 zero matrix substituted for unusable input.
    pub fn zero() -> Self {
        Self::Dense(DenseMatrix::zeros(1, 1))
    }

    pub fn rows(&self) -> usize {
        match self {
            Self::Dense(m) => m.rows(),
            Self::Sparse(m) => m.rows(),
        }
    }

    pub fn columns(&self) -> usize {
        match self {
            Self::Dense(m) => m.columns(),
            Self::Sparse(m) => m.columns(),
        }
    }

    /// Element at (row, column), or zero outside the bounds.
    pub fn get(&self, row: usize, column: usize) -> T {
        match self {
            Self::Dense(m) => m.get(row, column),
            Self::Sparse(m) => m.get(row, column),
        }
    }

    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self, Self::Sparse(_))
    }

    /// Iterate nonzero `(row, column, value)` triples in column-major order.
    ///
    /// The iterator is lazy and single-pass; call again for another pass.
    pub fn nonzeros(&self) -> Nonzeros<'_, T> {
        match self {
            Self::Dense(m) => Nonzeros::Dense { matrix: m, row: 0, column: 0 },
            Self::Sparse(m) => Nonzeros::Sparse {
                columns: m.column_data().iter().enumerate(),
                current: None,
            },
        }
    }

    pub fn to_dense(&self) -> DenseMatrix<T> {
        match self {
            Self::Dense(m) => m.clone(),
            Self::Sparse(m) => {
                let mut d = DenseMatrix::zeros(m.rows(), m.columns());
                for (r, c, v) in self.nonzeros() {
                    d.set(r, c, v);
                }
                d
            }
        }
    }
}

impl<T: Element> From<DenseMatrix<T>> for Matrix<T> {
    fn from(m: DenseMatrix<T>) -> Self {
        Self::Dense(m)
    }
}

impl<T: Element> From<SparseMatrix<T>> for Matrix<T> {
    fn from(m: SparseMatrix<T>) -> Self {
        Self::Sparse(m)
    }
}

/// Iterator over the nonzero entries of a [`Matrix`].
pub enum Nonzeros<'a, T: Element> {
    Dense {
        matrix: &'a DenseMatrix<T>,
        row: usize,
        column: usize,
    },
    Sparse {
        columns: std::iter::Enumerate<std::slice::Iter<'a, btree_map::BTreeMap<usize, T>>>,
        current: Option<(usize, btree_map::Iter<'a, usize, T>)>,
    },
}

impl<T: Element> Iterator for Nonzeros<'_, T> {
    type Item = (usize, usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Dense { matrix, row, column } => {
                while *column < matrix.columns() {
                    while *row < matrix.rows() {
                        let r = *row;
                        *row += 1;
                        let v = matrix.get(r, *column);
                        if !v.is_zero() {
                            return Some((r, *column, v));
                        }
                    }
                    *row = 0;
                    *column += 1;
                }
                None
            }
            Self::Sparse { columns, current } => loop {
                if let Some((c, entries)) = current {
                    if let Some((&r, &v)) = entries.next() {
                        return Some((r, *c, v));
                    }
                }
                let (c, map) = columns.next()?;
                *current = Some((c, map.iter()));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_nonzeros_column_major() {
        let m: Matrix<f64> = DenseMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 0.0]]).into();
        let nz: Vec<_> = m.nonzeros().collect();
        assert_eq!(nz, vec![(0, 0, 1.0), (2, 0, 3.0), (1, 1, 2.0)]);
    }

    #[test]
    fn test_sparse_nonzeros_ordered() {
        let mut s = SparseMatrix::new(0, 0);
        s.set(5, 2, 1);
        s.set(1, 2, 2);
        s.set(3, 0, 3);
        let m = Matrix::from(s);
        let nz: Vec<_> = m.nonzeros().collect();
        assert_eq!(nz, vec![(3, 0, 3), (1, 2, 2), (5, 2, 1)]);
        assert!(m.is_sparse());
        assert_eq!(m.to_dense().get(5, 2), 1);
    }

    #[test]
    fn test_single_pass() {
        let m = Matrix::<f64>::zero();
        let mut it = m.nonzeros();
        assert!(it.next().is_none());
        assert!(it.next().is_none());
        assert_eq!((m.rows(), m.columns()), (1, 1));
    }
}
