//! rf-workflow: step catalog, execution planning, and per-step state tracking.
//!
//! The catalog defines the fixed sequence of media-generation steps; the
//! planner turns it into an ordered execution plan with a dry-run report;
//! the tracker owns the persisted status of every step instance; the
//! executor seam and runner drive the plan sequentially.

pub mod catalog;
pub mod executor;
pub mod planner;
pub mod runner;
pub mod tracker;

pub use catalog::{StepCatalog, StepDefinition};
pub use executor::{ExecutorRegistry, StepExecutor};
pub use planner::{PlanReport, Planner};
pub use runner::{RunOutcome, WorkflowRunner};
pub use tracker::{Progress, StepRef, StepTracker};
