//! Per-step status tracking for a project's workflow.
//!
//! The tracker owns the persisted state of every step instance: transitions,
//! timestamps, payload references, error messages, and retry counts. Each
//! transition runs inside its own SQLite transaction and is last-write-wins
//! on the row; callers are expected to serialize writes per project. The
//! tracker also computes aggregate progress and a remaining-time estimate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rf_core::{Error, ProjectId, Result, StepStatus};
use rf_db::models::StepState;
use rf_db::pool::{get_conn, DbPool};
use rf_db::queries::{projects, steps};

use crate::catalog::StepCatalog;

/// Seconds assumed per remaining step when no duration has been observed yet.
const FALLBACK_STEP_SECS: f64 = 60.0;

/// Address one step either by its ordinal or by its unique name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRef {
    Number(i64),
    Name(String),
}

impl From<i64> for StepRef {
    fn from(n: i64) -> Self {
        StepRef::Number(n)
    }
}

impl From<&str> for StepRef {
    fn from(name: &str) -> Self {
        StepRef::Name(name.to_string())
    }
}

/// Aggregate progress over a project's workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub running: usize,
    pub pending: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `(completed + skipped) / total * 100`, or 0 when there are no steps.
    pub completion_percentage: f64,
    /// The first step found with status `running`, if any.
    pub current_step: Option<StepState>,
}

/// Tracks and mutates the persisted status of every step of a project.
#[derive(Clone)]
pub struct StepTracker {
    pool: DbPool,
    catalog: StepCatalog,
}

impl StepTracker {
    pub fn new(pool: DbPool, catalog: StepCatalog) -> Self {
        Self { pool, catalog }
    }

    /// Shared access to the underlying pool (for collaborators built on the
    /// same database).
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// The catalog this tracker instantiates workflows from.
    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    // -- workflow initialization --------------------------------------------

    /// Create one pending step row per catalog entry for a project.
    ///
    /// All rows are inserted in a single transaction.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the project does not exist.
    pub fn init_workflow(&self, project_id: ProjectId) -> Result<Vec<StepState>> {
        let conn = get_conn(&self.pool)?;

        projects::get_project(&conn, project_id)?
            .ok_or_else(|| Error::not_found("project", project_id))?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        for def in self.catalog.all() {
            steps::insert_step(&tx, project_id, def.step_id, def.step_name)?;
        }
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        steps::list_steps(&conn, project_id)
    }

    // -- transitions --------------------------------------------------------

    /// Move a step to `running`, recording the input payload.
    pub fn start(
        &self,
        project_id: ProjectId,
        step_number: i64,
        input: Option<&serde_json::Value>,
    ) -> Result<StepState> {
        self.transition(project_id, step_number, |tx, now| {
            steps::mark_started(tx, project_id, step_number, to_payload(input)?.as_deref(), now)
        })
    }

    /// Move a running step to `completed`, recording the output payload.
    pub fn complete(
        &self,
        project_id: ProjectId,
        step_number: i64,
        output: Option<&serde_json::Value>,
    ) -> Result<StepState> {
        self.transition(project_id, step_number, |tx, now| {
            steps::mark_completed(tx, project_id, step_number, to_payload(output)?.as_deref(), now)
        })
    }

    /// Move a running step to `failed`, recording the error message.
    pub fn fail(
        &self,
        project_id: ProjectId,
        step_number: i64,
        message: &str,
    ) -> Result<StepState> {
        self.transition(project_id, step_number, |tx, _now| {
            steps::mark_failed(tx, project_id, step_number, message)
        })
    }

    /// Restart a failed step: same effects as [`start`](Self::start) plus a
    /// retry_count increment, applied as one atomic update.
    pub fn retry(
        &self,
        project_id: ProjectId,
        step_number: i64,
        input: Option<&serde_json::Value>,
    ) -> Result<StepState> {
        self.transition(project_id, step_number, |tx, now| {
            steps::mark_retried(tx, project_id, step_number, to_payload(input)?.as_deref(), now)
        })
    }

    /// Skip a step from any status; the reason is recorded in error_message.
    pub fn skip(
        &self,
        project_id: ProjectId,
        step_number: i64,
        reason: &str,
    ) -> Result<StepState> {
        self.transition(project_id, step_number, |tx, now| {
            steps::mark_skipped(tx, project_id, step_number, reason, now)
        })
    }

    /// Return a step to a fresh `pending` row, clearing all recorded state.
    pub fn reset(&self, project_id: ProjectId, step_number: i64) -> Result<StepState> {
        self.transition(project_id, step_number, |tx, _now| {
            steps::reset_step(tx, project_id, step_number)
        })
    }

    /// Run one transition inside a transaction, mapping an untouched row to
    /// [`Error::StepNotFound`] and returning the updated state.
    fn transition<F>(&self, project_id: ProjectId, step_number: i64, op: F) -> Result<StepState>
    where
        F: FnOnce(&rusqlite::Connection, &str) -> Result<bool>,
    {
        let conn = get_conn(&self.pool)?;
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        if !op(&tx, &now)? {
            return Err(Error::step_not_found(project_id, step_number));
        }
        let updated = steps::get_by_number(&tx, project_id, step_number)?
            .ok_or_else(|| Error::step_not_found(project_id, step_number))?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        Ok(updated)
    }

    // -- queries ------------------------------------------------------------

    /// All steps of a project ordered by step_number.
    pub fn list_steps(&self, project_id: ProjectId) -> Result<Vec<StepState>> {
        let conn = get_conn(&self.pool)?;
        steps::list_steps(&conn, project_id)
    }

    /// One step by ordinal or name, or `None` if no such row exists.
    pub fn get_step(&self, project_id: ProjectId, step: impl Into<StepRef>) -> Result<Option<StepState>> {
        let conn = get_conn(&self.pool)?;
        match step.into() {
            StepRef::Number(n) => steps::get_by_number(&conn, project_id, n),
            StepRef::Name(name) => steps::get_by_name(&conn, project_id, &name),
        }
    }

    /// Steps currently in status `failed`, ordered by step_number.
    pub fn failed_steps(&self, project_id: ProjectId) -> Result<Vec<StepState>> {
        let conn = get_conn(&self.pool)?;
        steps::list_by_status(&conn, project_id, StepStatus::Failed)
    }

    /// Aggregate progress over all steps of a project.
    pub fn progress(&self, project_id: ProjectId) -> Result<Progress> {
        let all = self.list_steps(project_id)?;
        Ok(compute_progress(&all))
    }

    /// Estimate the remaining wall-clock seconds for a project.
    ///
    /// Averages the observed duration of steps that have both started_at and
    /// completed_at, multiplied by the number of steps still pending or
    /// running. Falls back to a flat 60 seconds per remaining step when no
    /// duration has been observed.
    pub fn estimate_remaining_secs(&self, project_id: ProjectId) -> Result<f64> {
        let all = self.list_steps(project_id)?;

        let remaining = all
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Pending | StepStatus::Running))
            .count() as f64;

        let durations: Vec<f64> = all
            .iter()
            .filter_map(|s| observed_duration_secs(s))
            .collect();

        if durations.is_empty() {
            return Ok(FALLBACK_STEP_SECS * remaining);
        }

        let avg = durations.iter().sum::<f64>() / durations.len() as f64;
        Ok(avg * remaining)
    }
}

/// Compute aggregate progress from a step list.
pub(crate) fn compute_progress(steps: &[StepState]) -> Progress {
    let total = steps.len();
    let count = |status: StepStatus| steps.iter().filter(|s| s.status == status).count();

    let completed = count(StepStatus::Completed);
    let skipped = count(StepStatus::Skipped);

    let completion_percentage = if total == 0 {
        0.0
    } else {
        (completed + skipped) as f64 / total as f64 * 100.0
    };

    Progress {
        total,
        completed,
        running: count(StepStatus::Running),
        pending: count(StepStatus::Pending),
        failed: count(StepStatus::Failed),
        skipped,
        completion_percentage,
        current_step: steps
            .iter()
            .find(|s| s.status == StepStatus::Running)
            .cloned(),
    }
}

/// Wall-clock duration of a step that has both timestamps, in seconds.
fn observed_duration_secs(step: &StepState) -> Option<f64> {
    let started: DateTime<Utc> = step.started_at.as_deref()?.parse().ok()?;
    let completed: DateTime<Utc> = step.completed_at.as_deref()?.parse().ok()?;
    let secs = (completed - started).num_milliseconds() as f64 / 1000.0;
    (secs >= 0.0).then_some(secs)
}

/// Serialize an opaque payload for storage. The tracker never inspects it.
fn to_payload(value: Option<&serde_json::Value>) -> Result<Option<String>> {
    value
        .map(|v| serde_json::to_string(v).map_err(|e| Error::database(e.to_string())))
        .transpose()
}
