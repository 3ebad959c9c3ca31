//! Error types for the holder layer.
//!
//! Only constructors and `close()` return these. The per-cycle query and
//! record paths degrade to zeros or blanks and log instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for holder operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Matrix text could not be interpreted
    #[error("Invalid matrix: {0}")]
    InvalidMatrix(String),

    /// M document text could not be parsed
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Date text is not a recognised ISO-8601 prefix
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A name is already bound to a holder of another kind
    #[error("Holder '{name}' already exists with a different type (requested {expected})")]
    HolderTypeMismatch { name: String, expected: &'static str },

    /// Operation on a holder that has already been closed
    #[error("Holder is closed: {0}")]
    Closed(String),

    /// One or more holders failed during teardown
    #[error("Teardown failed for {} holder(s)", .0.len())]
    Teardown(Vec<(String, String)>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid matrix error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidMatrix(msg.into())
    }
}

/// Result type alias for holder operations.
pub type Result<T> = std::result::Result<T, Error>;
