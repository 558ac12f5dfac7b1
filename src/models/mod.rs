//! Data models for the incident backend.
//!
//! Field names serialize as camelCase to match the web client.

mod ai;
mod comment;
mod incident;
mod places;
mod stats;

pub use ai::*;
pub use comment::*;
pub use incident::*;
pub use places::*;
pub use stats::*;
