//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod headings;
pub mod types;
