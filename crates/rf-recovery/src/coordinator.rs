//! Interrupted-project recovery: consistency audits, resume, and
//! recommendations.
//!
//! The coordinator never raises on a missing integrity item; it accumulates
//! string issues and returns a report. The only hard failure is a project
//! that does not exist at all.

use serde::Serialize;

use rf_core::layout::{ProjectLayout, REQUIRED_SUBDIRS};
use rf_core::{Error, ProjectId, ProjectStatus, Result, StepStatus};
use rf_db::models::{Project, StepState};
use rf_db::pool::get_conn;
use rf_db::queries::projects;
use rf_workflow::{Progress, StepTracker};

use crate::checkpoint::CheckpointManager;

/// Result of a database + filesystem consistency audit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub db_consistent: bool,
    pub fs_consistent: bool,
}

/// Outcome of resuming an interrupted project.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResumeResult {
    /// The running step if any, else the first pending step, else none.
    pub current_step: Option<StepState>,
    pub progress: Progress,
    pub next_actions: Vec<String>,
}

/// Urgency of the recovery recommendations.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

/// Human-readable guidance for a stalled or failed project.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recommendations {
    pub failed_steps: Vec<StepState>,
    pub recommended_actions: Vec<String>,
    pub priority: Priority,
}

/// Coordinates integrity checks, resumption, and checkpoint auto-saves.
#[derive(Clone)]
pub struct RecoveryCoordinator {
    tracker: StepTracker,
    checkpoints: CheckpointManager,
    layout: ProjectLayout,
    /// Checkpoints kept per project by [`auto_save_checkpoint`](Self::auto_save_checkpoint).
    retention: usize,
}

impl RecoveryCoordinator {
    pub fn new(
        tracker: StepTracker,
        checkpoints: CheckpointManager,
        layout: ProjectLayout,
    ) -> Self {
        Self {
            tracker,
            checkpoints,
            layout,
            retention: 5,
        }
    }

    /// Override the auto-save retention count (default 5).
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    // -- integrity ----------------------------------------------------------

    /// Audit one project's database rows against the expected on-disk layout.
    ///
    /// DB consistency requires the step numbers, sorted, to form a contiguous
    /// 1..N sequence; the first gap found is reported and the check stops.
    /// FS consistency requires the project root and every required
    /// subdirectory to exist; each missing one is reported.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the project itself does not exist.
    pub fn verify_integrity(&self, project_id: ProjectId) -> Result<IntegrityReport> {
        let conn = get_conn(self.tracker.pool())?;
        projects::get_project(&conn, project_id)?
            .ok_or_else(|| Error::not_found("project", project_id))?;
        drop(conn);

        let mut issues = Vec::new();

        let step_list = self.tracker.list_steps(project_id)?;
        let mut db_consistent = true;
        for (i, step) in step_list.iter().enumerate() {
            let expected = (i + 1) as i64;
            if step.step_number != expected {
                issues.push(format!("step number {expected} is missing from the workflow"));
                db_consistent = false;
                break;
            }
        }

        let mut fs_consistent = true;
        let root = self.layout.project_root(project_id);
        if !root.is_dir() {
            issues.push(format!("project directory {} does not exist", root.display()));
            fs_consistent = false;
        } else {
            for name in REQUIRED_SUBDIRS {
                if !root.join(name).is_dir() {
                    issues.push(format!("required directory '{name}' is missing"));
                    fs_consistent = false;
                }
            }
        }

        Ok(IntegrityReport {
            valid: db_consistent && fs_consistent,
            issues,
            db_consistent,
            fs_consistent,
        })
    }

    // -- resume -------------------------------------------------------------

    /// Resume an interrupted project: determine where execution stopped,
    /// mark the project running, and derive next actions.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the project does not exist.
    pub fn resume_interrupted(&self, project_id: ProjectId) -> Result<ResumeResult> {
        let step_list = self.tracker.list_steps(project_id)?;
        let progress = self.tracker.progress(project_id)?;

        let current_step = step_list
            .iter()
            .find(|s| s.status == StepStatus::Running)
            .or_else(|| step_list.iter().find(|s| s.status == StepStatus::Pending))
            .cloned();

        let conn = get_conn(self.tracker.pool())?;
        if !projects::set_status(&conn, project_id, ProjectStatus::Running)? {
            return Err(Error::not_found("project", project_id));
        }

        tracing::info!(
            "Resuming project {project_id} at {}",
            current_step
                .as_ref()
                .map(|s| s.step_name.as_str())
                .unwrap_or("end of workflow")
        );

        Ok(ResumeResult {
            next_actions: next_actions(&progress),
            current_step,
            progress,
        })
    }

    /// Projects whose status is `interrupted`.
    pub fn find_interrupted_projects(&self) -> Result<Vec<Project>> {
        let conn = get_conn(self.tracker.pool())?;
        projects::list_by_status(&conn, ProjectStatus::Interrupted)
    }

    // -- checkpointing ------------------------------------------------------

    /// Create, save, and prune in one call: the periodic auto-save.
    pub fn auto_save_checkpoint(&self, project_id: ProjectId) -> Result<std::path::PathBuf> {
        let checkpoint = self.checkpoints.create_checkpoint(project_id)?;
        let path = self.checkpoints.save_checkpoint(&checkpoint, None)?;
        self.checkpoints.prune_checkpoints(project_id, self.retention)?;
        Ok(path)
    }

    // -- recommendations ----------------------------------------------------

    /// Generate prioritized, human-readable recovery guidance.
    pub fn recovery_recommendations(&self, project_id: ProjectId) -> Result<Recommendations> {
        let failed_steps = self.tracker.failed_steps(project_id)?;
        let progress = self.tracker.progress(project_id)?;

        let mut actions = Vec::new();
        if !failed_steps.is_empty() {
            actions.push("Inspect the errors recorded on failed steps".to_string());
            actions.push("Consider retrying failed steps".to_string());
            actions.push("Consider skipping failed steps that are not essential".to_string());
        }
        if progress.running == 0 && progress.pending > 0 {
            actions.push("Start the next pending step".to_string());
        }
        if progress.completion_percentage > 0.0 && progress.running == 0 {
            actions.push("Consider finalizing the project".to_string());
        }

        let priority = if failed_steps.is_empty() {
            Priority::Medium
        } else {
            Priority::High
        };

        Ok(Recommendations {
            failed_steps,
            recommended_actions: actions,
            priority,
        })
    }
}

/// The deterministic next-action rule list. Rules are evaluated in order and
/// each matching rule appends; the fallback guarantees a non-empty result.
fn next_actions(progress: &Progress) -> Vec<String> {
    let mut actions = Vec::new();

    if progress.failed > 0 {
        actions.push("Resolve failed step errors".to_string());
        actions.push("Consider retry or skip for each failed step".to_string());
    }
    if progress.running > 0 {
        actions.push("Wait for the running step to finish".to_string());
    }
    if progress.pending > 0 {
        actions.push("Start the next step".to_string());
    }
    if (progress.completion_percentage - 100.0).abs() < f64::EPSILON {
        actions.push("Project complete; perform final checks".to_string());
    }
    if actions.is_empty() {
        actions.push("Inspect current project state".to_string());
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_db::queries::steps;
    use rf_workflow::StepCatalog;
    use tempfile::TempDir;

    fn setup() -> (RecoveryCoordinator, StepTracker, ProjectId, TempDir) {
        let tmp = TempDir::new().unwrap();
        let pool = rf_db::pool::init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let project =
            projects::create_project(&conn, "city at night", 3.0, &serde_json::json!({})).unwrap();
        drop(conn);

        let tracker = StepTracker::new(pool, StepCatalog);
        tracker.init_workflow(project.id).unwrap();

        let layout = ProjectLayout::new(tmp.path().join("projects"));
        layout.ensure_layout(project.id).unwrap();

        let manager = CheckpointManager::new(
            tracker.clone(),
            layout.clone(),
            tmp.path().join("checkpoints"),
        );
        let coordinator = RecoveryCoordinator::new(tracker.clone(), manager, layout);
        (coordinator, tracker, project.id, tmp)
    }

    #[test]
    fn integrity_passes_on_healthy_project() {
        let (coordinator, _tracker, id, _tmp) = setup();
        let report = coordinator.verify_integrity(id).unwrap();
        assert!(report.valid, "issues: {:?}", report.issues);
        assert!(report.db_consistent);
        assert!(report.fs_consistent);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn integrity_reports_step_gap() {
        // Steps {1, 2, 4}: number 3 is missing.
        let (coordinator, tracker, _id, tmp) = setup();
        let conn = tracker.pool().get().unwrap();
        let project = projects::create_project(&conn, "gap", 1.0, &serde_json::json!({})).unwrap();
        for n in [1, 2, 4] {
            steps::insert_step(&conn, project.id, n, &format!("step{n}")).unwrap();
        }
        drop(conn);
        ProjectLayout::new(tmp.path().join("projects"))
            .ensure_layout(project.id)
            .unwrap();

        let report = coordinator.verify_integrity(project.id).unwrap();
        assert!(!report.db_consistent);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.contains("step number 3")));
        // The check stops at the first gap: only one DB issue reported.
        assert_eq!(
            report.issues.iter().filter(|i| i.contains("step number")).count(),
            1
        );
    }

    #[test]
    fn integrity_reports_missing_directories() {
        let (coordinator, tracker, _id, tmp) = setup();
        let conn = tracker.pool().get().unwrap();
        let project = projects::create_project(&conn, "bare", 1.0, &serde_json::json!({})).unwrap();
        drop(conn);
        tracker.init_workflow(project.id).unwrap();

        // Root exists but only one subdirectory does.
        let layout = ProjectLayout::new(tmp.path().join("projects"));
        std::fs::create_dir_all(layout.subdir(project.id, "scripts")).unwrap();

        let report = coordinator.verify_integrity(project.id).unwrap();
        assert!(report.db_consistent);
        assert!(!report.fs_consistent);
        assert_eq!(report.issues.len(), REQUIRED_SUBDIRS.len() - 1);
    }

    #[test]
    fn integrity_missing_project_is_hard_failure() {
        let (coordinator, _tracker, _id, _tmp) = setup();
        let err = coordinator.verify_integrity(ProjectId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn resume_prefers_running_step() {
        let (coordinator, tracker, id, _tmp) = setup();
        tracker.start(id, 1, None).unwrap();
        tracker.complete(id, 1, None).unwrap();
        tracker.start(id, 2, None).unwrap();

        let result = coordinator.resume_interrupted(id).unwrap();
        assert_eq!(result.current_step.unwrap().step_number, 2);
        assert!(result
            .next_actions
            .contains(&"Wait for the running step to finish".to_string()));

        let conn = tracker.pool().get().unwrap();
        let project = projects::get_project(&conn, id).unwrap().unwrap();
        assert_eq!(project.status, ProjectStatus::Running);
    }

    #[test]
    fn resume_falls_back_to_first_pending() {
        let (coordinator, tracker, id, _tmp) = setup();
        tracker.start(id, 1, None).unwrap();
        tracker.complete(id, 1, None).unwrap();

        let result = coordinator.resume_interrupted(id).unwrap();
        assert_eq!(result.current_step.unwrap().step_number, 2);
        assert!(result
            .next_actions
            .contains(&"Start the next step".to_string()));
    }

    #[test]
    fn resume_of_finished_workflow_has_no_current_step() {
        let (coordinator, tracker, id, _tmp) = setup();
        for def in StepCatalog.all() {
            tracker.start(id, def.step_id, None).unwrap();
            tracker.complete(id, def.step_id, None).unwrap();
        }

        let result = coordinator.resume_interrupted(id).unwrap();
        assert!(result.current_step.is_none());
        assert_eq!(
            result.next_actions,
            vec!["Project complete; perform final checks".to_string()]
        );
    }

    #[test]
    fn resume_missing_project_errors() {
        let (coordinator, _tracker, _id, _tmp) = setup();
        let err = coordinator.resume_interrupted(ProjectId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn next_action_rules_compose() {
        let (coordinator, tracker, id, _tmp) = setup();
        // One failed, one running: rules 1 and 2 both apply, plus pending.
        tracker.start(id, 1, None).unwrap();
        tracker.fail(id, 1, "x").unwrap();
        tracker.start(id, 2, None).unwrap();

        let result = coordinator.resume_interrupted(id).unwrap();
        assert_eq!(
            result.next_actions,
            vec![
                "Resolve failed step errors".to_string(),
                "Consider retry or skip for each failed step".to_string(),
                "Wait for the running step to finish".to_string(),
                "Start the next step".to_string(),
            ]
        );
    }

    #[test]
    fn next_actions_never_empty() {
        // All steps skipped would hit rule 4; fabricate a state matching no
        // rule at all: zero steps.
        let progress = Progress {
            total: 0,
            completed: 0,
            running: 0,
            pending: 0,
            failed: 0,
            skipped: 0,
            completion_percentage: 0.0,
            current_step: None,
        };
        assert_eq!(
            next_actions(&progress),
            vec!["Inspect current project state".to_string()]
        );
    }

    #[test]
    fn find_interrupted_filters_by_status() {
        let (coordinator, tracker, id, _tmp) = setup();
        let conn = tracker.pool().get().unwrap();
        projects::set_status(&conn, id, ProjectStatus::Interrupted).unwrap();
        let other = projects::create_project(&conn, "other", 1.0, &serde_json::json!({})).unwrap();
        projects::set_status(&conn, other.id, ProjectStatus::Running).unwrap();
        drop(conn);

        let interrupted = coordinator.find_interrupted_projects().unwrap();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].id, id);
    }

    #[test]
    fn auto_save_prunes_to_retention() {
        let (coordinator, _tracker, id, _tmp) = setup();
        let coordinator = coordinator.with_retention(2);

        // Saves within the same second collide on the filename, so guarantee
        // distinct capture stamps through the manager directly.
        for i in 0..4 {
            let mut cp = coordinator.checkpoints.create_checkpoint(id).unwrap();
            cp.created_at = format!("2026-08-30T09:0{i}:00+00:00");
            coordinator.checkpoints.save_checkpoint(&cp, None).unwrap();
        }
        coordinator.auto_save_checkpoint(id).unwrap();

        let remaining = coordinator.checkpoints.list_checkpoints(id).unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn recommendations_high_priority_on_failures() {
        let (coordinator, tracker, id, _tmp) = setup();
        tracker.start(id, 1, None).unwrap();
        tracker.fail(id, 1, "provider quota exhausted").unwrap();

        let recs = coordinator.recovery_recommendations(id).unwrap();
        assert_eq!(recs.priority, Priority::High);
        assert_eq!(recs.failed_steps.len(), 1);
        assert_eq!(
            recs.recommended_actions,
            vec![
                "Inspect the errors recorded on failed steps".to_string(),
                "Consider retrying failed steps".to_string(),
                "Consider skipping failed steps that are not essential".to_string(),
                "Start the next pending step".to_string(),
            ]
        );
    }

    #[test]
    fn recommendations_medium_priority_when_stalled() {
        let (coordinator, tracker, id, _tmp) = setup();
        tracker.start(id, 1, None).unwrap();
        tracker.complete(id, 1, None).unwrap();

        let recs = coordinator.recovery_recommendations(id).unwrap();
        assert_eq!(recs.priority, Priority::Medium);
        assert!(recs.failed_steps.is_empty());
        assert_eq!(
            recs.recommended_actions,
            vec![
                "Start the next pending step".to_string(),
                "Consider finalizing the project".to_string(),
            ]
        );
    }
}
