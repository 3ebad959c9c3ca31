//! M documents - hierarchical key/value parameter files.
//!
//! - [`MNode`] - ordered tree with the indented text codec
//! - [`MDocument`] - registry holder with typed queries and matrix views

mod document;
mod node;

pub use document::MDocument;
pub use node::{MNode, DOCUMENT_VERSION_TAG};
