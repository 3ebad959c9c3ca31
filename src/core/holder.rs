//! The holder trait.

use crate::matrix::Matrix;
use crate::util::{Element, Result};

/// A file-backed resource owned by a [`Registry`](super::Registry).
pub trait Holder: 'static {
    /// Flush and release any open file. Called once at teardown.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Matrices are read whole at creation and hold no file open.
impl<T: Element> Holder for Matrix<T> {}
