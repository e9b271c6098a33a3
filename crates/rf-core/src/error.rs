//! Unified error type for the reelforge workflow core.
//!
//! All crates funnel their failures into [`Error`]. The variants mirror the
//! failure taxonomy of the workflow engine: caller mistakes (`UnknownStep`,
//! `StepNotFound`), checkpoint/restore failures (`Recovery`), and the usual
//! infrastructure failures (database, I/O).

use std::fmt;

/// Unified error type covering all failure modes in reelforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "project", "checkpoint").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The planner was given a step name that is not in the catalog.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// A tracker operation targeted a (project, step) pair with no row.
    #[error("Step {step_number} not found for project {project_id}")]
    StepNotFound {
        /// The project whose workflow was addressed.
        project_id: String,
        /// The 1-based step number that has no row.
        step_number: i64,
    },

    /// A checkpoint is missing, malformed, mismatched, or failed to restore.
    #[error("Recovery error: {0}")]
    Recovery(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A step executor returned an error while performing its work.
    #[error("Executor error [{step}]: {message}")]
    Executor {
        /// The step whose executor failed.
        step: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::StepNotFound`].
    pub fn step_not_found(project_id: impl fmt::Display, step_number: i64) -> Self {
        Error::StepNotFound {
            project_id: project_id.to_string(),
            step_number,
        }
    }

    /// Convenience constructor for [`Error::Recovery`].
    pub fn recovery(message: impl Into<String>) -> Self {
        Error::Recovery(message.into())
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Executor`].
    pub fn executor(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Executor {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
