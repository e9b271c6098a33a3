//! rf-recovery: checkpointing and interrupted-project recovery.
//!
//! The checkpoint manager snapshots a project's full workflow state into a
//! versioned JSON document and can restore it atomically; the recovery
//! coordinator audits consistency, finds interrupted projects, and produces
//! resume plans and human-readable recommendations.

pub mod checkpoint;
pub mod coordinator;

pub use checkpoint::{Checkpoint, CheckpointManager, ValidationReport, WorkflowSnapshot};
pub use coordinator::{
    IntegrityReport, Priority, Recommendations, RecoveryCoordinator, ResumeResult,
};
