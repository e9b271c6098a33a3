//! Sequential workflow driver.
//!
//! Runs an execution plan one step at a time in `step_id` order: mark the
//! step running, invoke its executor, record the outcome. A failing step
//! halts the run and leaves the step `failed` for later retry or skip.
//! An optional hook fires after every recorded outcome so callers can
//! checkpoint between steps.

use std::sync::Arc;

use rf_core::{Error, ProjectId, ProjectStatus, Result};
use rf_db::pool::get_conn;
use rf_db::queries::projects;

use crate::catalog::StepDefinition;
use crate::executor::ExecutorRegistry;
use crate::tracker::StepTracker;

/// Callback invoked after each step's outcome has been persisted.
pub type StepHook = Arc<dyn Fn(ProjectId) + Send + Sync>;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step in the plan completed.
    Completed,
    /// Execution halted at this step; its row is left `failed`.
    Failed { step_number: i64 },
}

/// Drives a plan through the tracker and executor registry, strictly
/// sequentially.
pub struct WorkflowRunner {
    tracker: StepTracker,
    registry: ExecutorRegistry,
    step_hook: Option<StepHook>,
}

impl WorkflowRunner {
    pub fn new(tracker: StepTracker, registry: ExecutorRegistry) -> Self {
        Self {
            tracker,
            registry,
            step_hook: None,
        }
    }

    /// Install a hook called after each step outcome is recorded
    /// (typically an auto-save checkpoint).
    pub fn with_step_hook(mut self, hook: StepHook) -> Self {
        self.step_hook = Some(hook);
        self
    }

    /// Execute the plan for one project.
    ///
    /// The project is marked `running` up front, then `completed` or
    /// `failed` according to the outcome. Steps already in a terminal
    /// status (completed or skipped) are passed over, so a plan built
    /// from a resume point re-runs only unfinished work.
    ///
    /// # Errors
    ///
    /// Fails fast with [`Error::UnknownStep`] if any plan entry lacks an
    /// executor, and propagates tracker/storage errors. An executor error
    /// is *not* propagated; it is recorded on the step and reported via
    /// [`RunOutcome::Failed`].
    pub async fn run(&self, project_id: ProjectId, plan: &[StepDefinition]) -> Result<RunOutcome> {
        self.registry.verify_plan(plan)?;
        self.set_project_status(project_id, ProjectStatus::Running)?;

        let mut carried_input = serde_json::json!({});

        for def in plan {
            let existing = self
                .tracker
                .get_step(project_id, def.step_id)?
                .ok_or_else(|| Error::step_not_found(project_id, def.step_id))?;
            if existing.status.is_terminal() {
                if let Some(output) = existing.output_data {
                    carried_input = output;
                }
                continue;
            }

            tracing::info!("Starting: {} (step {})", def.display_name, def.step_id);
            self.tracker
                .start(project_id, def.step_id, Some(&carried_input))?;

            let executor = self.registry.get(def.step_name)?;
            match executor.execute(project_id, carried_input.clone()).await {
                Ok(output) => {
                    self.tracker
                        .complete(project_id, def.step_id, Some(&output))?;
                    tracing::info!("Completed: {}", def.display_name);
                    carried_input = output;
                    self.fire_hook(project_id);
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!("Step {} failed: {message}", def.step_name);
                    self.tracker.fail(project_id, def.step_id, &message)?;
                    self.fire_hook(project_id);
                    self.set_project_status(project_id, ProjectStatus::Failed)?;
                    return Ok(RunOutcome::Failed {
                        step_number: def.step_id,
                    });
                }
            }
        }

        self.set_project_status(project_id, ProjectStatus::Completed)?;
        Ok(RunOutcome::Completed)
    }

    fn fire_hook(&self, project_id: ProjectId) {
        if let Some(hook) = &self.step_hook {
            hook(project_id);
        }
    }

    fn set_project_status(&self, project_id: ProjectId, status: ProjectStatus) -> Result<()> {
        let conn = get_conn(self.tracker.pool())?;
        if !projects::set_status(&conn, project_id, status)? {
            return Err(Error::not_found("project", project_id));
        }
        Ok(())
    }
}
