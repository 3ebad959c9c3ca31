//! Dense and sparse matrix text parser.
//!
//! Dense: `~[1 2 3; 4,5,6]` where the optional `~` before the bracket
//! transposes the result, rows split on `;` or newline and elements on `,`,
//! space or tab. An empty comma-delimited element reads as 0.
//!
//! Sparse: a first line `Sparse` followed by `row,col,value` lines (0-based).

use std::fs::File;
use std::path::Path;

use tracing::{debug, warn};

use super::{DenseMatrix, Matrix, SparseMatrix};
use crate::util::{Element, Error, Result};

const SPARSE_TAG: &str = "Sparse";
const TRANSPOSE_MARKER: char = '~';

/// Column storage is allocated up front, so sparse column indices are capped.
const MAX_SPARSE_COLUMNS: usize = 1 << 20;

/// Loads matrix files into memory.
pub struct MatrixLoader;

impl MatrixLoader {
    /// Load a matrix, never failing.
    ///
    /// Unreadable, malformed or empty input is logged and replaced by a 1×1
    /// zero matrix so the simulation keeps running.
    pub fn load<T: Element>(path: impl AsRef<Path>, exponent: i32) -> Matrix<T> {
        let path = path.as_ref();
        match Self::try_load(path, exponent) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "substituting 1x1 zero matrix");
                Matrix::zero()
            }
        }
    }

    /// Load a matrix, reporting why it could not be used.
    pub fn try_load<T: Element>(path: impl AsRef<Path>, exponent: i32) -> Result<Matrix<T>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let m = read_whole(&file, |text| Self::parse_str(text, exponent))?;
        debug!(
            path = %path.display(),
            rows = m.rows(),
            columns = m.columns(),
            sparse = m.is_sparse(),
            "loaded matrix"
        );
        Ok(m)
    }

    /// Parse matrix text. Fails if the result has no rows or no columns.
    pub fn parse_str<T: Element>(text: &str, exponent: i32) -> Result<Matrix<T>> {
        let first = text.lines().map(str::trim).find(|l| !l.is_empty());
        let m = if first == Some(SPARSE_TAG) {
            Matrix::Sparse(parse_sparse(text, exponent))
        } else {
            Matrix::Dense(parse_dense(text, exponent)?)
        };
        if m.rows() == 0 || m.columns() == 0 {
            return Err(Error::invalid(format!("empty matrix ({}x{})", m.rows(), m.columns())));
        }
        Ok(m)
    }
}

#[cfg(feature = "mmap")]
fn read_whole<R>(file: &File, parse: impl FnOnce(&str) -> Result<R>) -> Result<R> {
    if file.metadata()?.len() == 0 {
        return parse("");
    }
    // Safety: the map is read-only and dropped before this function returns.
    let map = unsafe { memmap2::Mmap::map(file) }?;
    parse(std::str::from_utf8(&map)?)
}

#[cfg(not(feature = "mmap"))]
fn read_whole<R>(mut file: &File, parse: impl FnOnce(&str) -> Result<R>) -> Result<R> {
    use std::io::Read;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    parse(&text)
}

fn parse_dense<T: Element>(text: &str, exponent: i32) -> Result<DenseMatrix<T>> {
    let open = text
        .find('[')
        .ok_or_else(|| Error::invalid("missing opening '['"))?;
    let transpose = text[..open].contains(TRANSPOSE_MARKER);
    let rest = &text[open + 1..];
    let body = match rest.find(']') {
        Some(close) => &rest[..close],
        None => rest,
    };

    let rows: Vec<Vec<T>> = body
        .split(|c: char| c == ';' || c == '\n')
        .map(|line| parse_dense_row(line, exponent))
        .filter(|row| !row.is_empty())
        .collect();

    let m = DenseMatrix::from_rows(rows);
    Ok(if transpose { m.transpose() } else { m })
}

fn parse_dense_row<T: Element>(line: &str, exponent: i32) -> Vec<T> {
    let mut row = Vec::new();
    let pieces: Vec<&str> = line.split(',').collect();
    let comma_separated = pieces.len() > 1;
    for piece in pieces {
        let mut tokens = piece.split_whitespace().peekable();
        if tokens.peek().is_none() {
            if comma_separated {
                row.push(T::default());
            }
            continue;
        }
        row.extend(tokens.map(|t| T::parse(t, exponent)));
    }
    row
}

fn parse_sparse<T: Element>(text: &str, exponent: i32) -> SparseMatrix<T> {
    let mut m = SparseMatrix::new(0, 0);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    lines.next(); // tag
    for line in lines {
        let mut fields = line.split(',').map(str::trim);
        let (Some(r), Some(c), Some(v)) = (fields.next(), fields.next(), fields.next()) else {
            debug!(line, "skipping malformed sparse entry");
            continue;
        };
        let (Ok(row), Ok(column)) = (r.parse::<usize>(), c.parse::<usize>()) else {
            debug!(line, "skipping sparse entry with bad index");
            continue;
        };
        if row.checked_add(1).is_none() || column >= MAX_SPARSE_COLUMNS {
            debug!(line, "skipping sparse entry with out-of-range index");
            continue;
        }
        m.reserve(row, column);
        let value = T::parse(v, exponent);
        if !value.is_zero() {
            m.set(row, column, value);
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(text: &str) -> DenseMatrix<f64> {
        match MatrixLoader::parse_str::<f64>(text, 0).unwrap() {
            Matrix::Dense(m) => m,
            Matrix::Sparse(_) => panic!("expected dense"),
        }
    }

    #[test]
    fn test_dense_separators() {
        let m = dense("[1 2 3; 4,5,6\n7\t8\t9]");
        assert_eq!((m.rows(), m.columns()), (3, 3));
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_dense_empty_element_is_zero() {
        let m = dense("[1,,3]");
        assert_eq!(m.as_slice(), &[1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_dense_ignores_blank_rows_and_crlf() {
        let m = dense("[\r\n 1 2;\r\n\r\n 3 4 \r\n]");
        assert_eq!((m.rows(), m.columns()), (2, 2));
        assert_eq!(m.get(1, 1), 4.0);
    }

    #[test]
    fn test_dense_transpose_marker() {
        let plain = dense("[1 2 3; 4 5 6]");
        let marked = dense("~[1 2 3; 4 5 6]");
        assert_eq!(marked, plain.transpose());
        assert_eq!((marked.rows(), marked.columns()), (3, 2));
    }

    #[test]
    fn test_dense_fixed_point() {
        let m = MatrixLoader::parse_str::<i32>("[1 -0.5]", 0).unwrap();
        assert_eq!(m.get(0, 0), 1 << 30);
        assert_eq!(m.get(0, 1), -(1 << 29));
    }

    #[test]
    fn test_sparse_parse() {
        let m = MatrixLoader::parse_str::<f64>("Sparse\n0,0,1.5\n2,1,0\n1,3,-2\n", 0).unwrap();
        assert!(m.is_sparse());
        assert_eq!((m.rows(), m.columns()), (3, 4));
        let nz: Vec<_> = m.nonzeros().collect();
        assert_eq!(nz, vec![(0, 0, 1.5), (1, 3, -2.0)]);
    }

    #[test]
    fn test_sparse_skips_garbage() {
        let m = MatrixLoader::parse_str::<f64>("Sparse\n0,0,1\nhello\nx,1,2\n", 0).unwrap();
        assert_eq!(m.nonzeros().count(), 1);
    }

    #[test]
    fn test_sparse_skips_out_of_range_indices() {
        let text = format!(
            "Sparse\n{max},0,1\n0,{max},1\n0,4000000000,1\n1,1,2\n",
            max = usize::MAX
        );
        let m = MatrixLoader::parse_str::<f64>(&text, 0).unwrap();
        assert_eq!((m.rows(), m.columns()), (2, 2));
        assert_eq!(m.nonzeros().collect::<Vec<_>>(), vec![(1, 1, 2.0)]);

        // Nothing usable left: rejected, so `load` would substitute 1x1 zero.
        let only_bad = format!("Sparse\n{},0,1\n", usize::MAX);
        assert!(MatrixLoader::parse_str::<f64>(&only_bad, 0).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(MatrixLoader::parse_str::<f64>("[]", 0).is_err());
        assert!(MatrixLoader::parse_str::<f64>("", 0).is_err());
        assert!(MatrixLoader::parse_str::<f64>("Sparse\n", 0).is_err());
    }
}
