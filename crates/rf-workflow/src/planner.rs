//! Execution planning and the dry-run report.
//!
//! The planner is a pure function of the catalog: it orders definitions by
//! `step_id`, optionally filters to a resume point, and can render a dry-run
//! report with per-step estimates, a total duration, a coarse cost figure,
//! and the static list of external prerequisites. Nothing here touches the
//! database or the filesystem.

use serde::Serialize;

use rf_core::{Error, Result};

use crate::catalog::{StepCatalog, StepDefinition};

/// Flat, coarse cost figure per estimated minute of pipeline work. Covers
/// model API calls and encoding compute; informational only.
const COST_PER_ESTIMATED_MINUTE_USD: f64 = 0.35;

/// External requirements the pipeline assumes but never validates.
const PREREQUISITES: &[&str] = &[
    "API credentials for the text, speech, and image providers",
    "ffmpeg binary available on PATH",
    "at least 2 GB free disk space under the workspace root",
];

/// One row of the dry-run report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanStepReport {
    pub step_id: i64,
    pub step_name: String,
    pub display_name: String,
    pub description: String,
    pub estimated_duration_minutes: f64,
    pub dependencies: Vec<String>,
}

/// Aggregate dry-run report for one execution plan.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanReport {
    pub steps: Vec<PlanStepReport>,
    pub total_duration_secs: u64,
    pub estimated_cost_usd: f64,
    pub prerequisites: Vec<String>,
}

/// Builds ordered execution plans from the step catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner {
    catalog: StepCatalog,
}

impl Planner {
    pub fn new(catalog: StepCatalog) -> Self {
        Self { catalog }
    }

    /// Return the ordered execution plan.
    ///
    /// With a start step name, the plan contains only definitions whose
    /// `step_id` is greater than or equal to the start step's.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownStep`] if `start_step` names a step not in the catalog.
    pub fn build_plan(&self, start_step: Option<&str>) -> Result<Vec<StepDefinition>> {
        let all = self.catalog.all();

        let Some(name) = start_step else {
            return Ok(all);
        };

        let start = self
            .catalog
            .by_name(name)
            .ok_or_else(|| Error::UnknownStep(name.to_string()))?;

        Ok(all
            .into_iter()
            .filter(|s| s.step_id >= start.step_id)
            .collect())
    }

    /// Render a dry-run report for a plan.
    pub fn dry_run_report(&self, plan: &[StepDefinition]) -> PlanReport {
        let total_duration_secs: u64 = plan.iter().map(|s| s.estimated_duration_secs).sum();
        let total_minutes = total_duration_secs as f64 / 60.0;

        let steps = plan
            .iter()
            .map(|s| PlanStepReport {
                step_id: s.step_id,
                step_name: s.step_name.to_string(),
                display_name: s.display_name.to_string(),
                description: s.description.to_string(),
                estimated_duration_minutes: s.estimated_duration_secs as f64 / 60.0,
                dependencies: s.dependencies.iter().map(|d| d.to_string()).collect(),
            })
            .collect();

        PlanReport {
            steps,
            total_duration_secs,
            estimated_cost_usd: total_minutes * COST_PER_ESTIMATED_MINUTE_USD,
            prerequisites: PREREQUISITES.iter().map(|p| p.to_string()).collect(),
        }
    }
}
