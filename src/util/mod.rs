//! Utility types shared by every holder.
//!
//! - [`Element`] - Numeric storage types (native float or fixed point)
//! - [`Error`] / [`Result`] - Error handling

mod element;
mod error;

pub use element::*;
pub use error::*;
