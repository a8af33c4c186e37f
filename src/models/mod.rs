//! Data models for the crew roster.
//!
//! Field names serialize in camelCase to match the roster API contract.

mod crew;
mod filters;
mod selection;

pub use crew::*;
pub use filters::*;
pub use selection::*;
