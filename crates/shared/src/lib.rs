//! TeamSync Shared Types and Utilities
//!
//! Domain types and errors shared between the TeamSync server components.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
