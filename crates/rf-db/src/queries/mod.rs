//! Database query modules.

pub mod projects;
pub mod steps;
