//! Core layer - holder lifecycle.
//!
//! This module provides:
//! - [`Holder`] - a file-backed resource closed at run end
//! - [`Registry`] - run-scoped name→handle cache with idempotent lookup
//! - [`TeardownReport`] - what happened when the registry was closed

mod holder;
mod registry;

pub use holder::Holder;
pub use registry::{Handle, Registry, TeardownReport};
