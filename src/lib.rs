//! # sim-holders
//!
//! File-backed data holders for generated simulations: matrices read from
//! text, streaming tabular input with time interpolation, tabular output
//! with a growing schema and per-column metadata, and M parameter documents.
//!
//! ## Modules
//!
//! - [`util`] - Errors and numeric element types
//! - [`fixedpoint`] - 32-bit fixed-point encode/decode
//! - [`matrix`] - Dense and sparse matrices and their text loader
//! - [`table`] - Tabular input reader and output writer
//! - [`mdoc`] - Hierarchical M parameter documents
//! - [`core`] - Holder trait and the run-scoped registry
//!
//! ## Example
//!
//! ```ignore
//! use sim_holders::prelude::*;
//!
//! let registry = Registry::new();
//! let input = registry.input("drive.csv", InputOptions::default().smooth(true))?;
//! let output = registry.output("trace.tsv", OutputOptions::default())?;
//!
//! for step in 0..100 {
//!     let t = step as f64 * 0.1;
//!     let v = input.borrow_mut().get_by_name(t, "voltage");
//!     output.borrow_mut().record(t, "v", v, None);
//! }
//! registry.close().into_result()?;
//! ```

pub mod util;
pub mod fixedpoint;
pub mod matrix;
pub mod table;
pub mod mdoc;
pub mod core;

// Re-export commonly used types
pub use crate::util::{Element, Error, Result};
pub use crate::core::{Handle, Holder, Registry, TeardownReport};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Element, Error, Result};
    pub use crate::core::{Handle, Holder, Registry, TeardownReport};
    pub use crate::matrix::{DenseMatrix, Matrix, MatrixLoader, SparseMatrix};
    pub use crate::table::{InputOptions, InputReader, OutputOptions, OutputWriter};
    pub use crate::mdoc::{MDocument, MNode};
    pub use crate::fixedpoint::{FIXED_INFINITY, FIXED_MSB, FIXED_NAN};
}
