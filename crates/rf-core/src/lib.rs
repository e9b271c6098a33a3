//! rf-core: shared types, IDs, errors, configuration, and project layout.
//!
//! This crate is the foundational dependency for all other rf-* crates,
//! providing type-safe identifiers, a unified error type, workflow status
//! enums, application configuration, and the on-disk project layout used
//! by the integrity scan.

pub mod config;
pub mod error;
pub mod ids;
pub mod layout;
pub mod status;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use status::*;
