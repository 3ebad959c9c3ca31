//! Delimited text tables.
//!
//! - [`InputReader`] - streaming input with schema and time-column discovery
//! - [`OutputWriter`] - row-per-instant output with a growing header
//! - [`ColumnSchema`] - append-only name→slot mapping with a revision counter
//! - [`ColumnMode`] / [`ColumnSidecar`] - per-column hints and their file
//! - [`parse_date`] - ISO-8601 prefixes to epoch seconds

mod date;
mod mode;
mod reader;
mod schema;
mod sidecar;
mod writer;

pub use date::{looks_like_date, parse_date};
pub use mode::{parse_hints, ColumnMode};
pub use reader::{InputOptions, InputReader};
pub use schema::ColumnSchema;
pub use sidecar::{ColumnSidecar, SidecarColumn, SIDECAR_VERSION_TAG};
pub use writer::{OutputOptions, OutputWriter, TIME_COLUMN};
