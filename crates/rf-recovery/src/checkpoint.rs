//! Checkpoint creation, persistence, validation, restoration, and pruning.
//!
//! A checkpoint is an immutable JSON document: project metadata, the full
//! step-state list, aggregate progress, and a file-integrity scan, tagged
//! with a schema version and capture timestamp. Documents are written
//! atomically (tempfile + rename) so a crash mid-write can never leave a
//! half-written file that passes validation later.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rf_core::layout::{FileIntegrity, ProjectLayout};
use rf_core::{CheckpointId, Error, ProjectId, Result, StepStatus};
use rf_db::models::{Project, StepState};
use rf_db::pool::get_conn;
use rf_db::queries::{projects, steps};
use rf_workflow::{Progress, StepTracker};

/// Current checkpoint document schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Filename timestamp format: colon-free so it is filesystem-safe.
const FILENAME_TS_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Captured workflow state: every step row plus the aggregate view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSnapshot {
    pub steps: Vec<StepState>,
    pub progress: Progress,
}

/// A full project snapshot at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Unique identity of this document, independent of its filename.
    pub id: CheckpointId,
    /// Schema version tag for forward compatibility.
    pub version: u32,
    /// Capture time, RFC3339.
    pub created_at: String,
    pub project: Project,
    pub workflow: WorkflowSnapshot,
    pub files: FileIntegrity,
}

/// Accumulated validation result for a raw checkpoint document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Builds, persists, validates, restores, and prunes checkpoints.
#[derive(Clone)]
pub struct CheckpointManager {
    tracker: StepTracker,
    layout: ProjectLayout,
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(tracker: StepTracker, layout: ProjectLayout, checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            tracker,
            layout,
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    /// Directory checkpoint documents are written into.
    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    // -- capture ------------------------------------------------------------

    /// Build a checkpoint from the project's current persisted state.
    ///
    /// # Errors
    ///
    /// [`Error::Recovery`] if the project does not exist.
    pub fn create_checkpoint(&self, project_id: ProjectId) -> Result<Checkpoint> {
        let conn = get_conn(self.tracker.pool())?;
        let project = projects::get_project(&conn, project_id)?
            .ok_or_else(|| Error::recovery(format!("project {project_id} does not exist")))?;
        drop(conn);

        let step_list = self.tracker.list_steps(project_id)?;
        let progress = self.tracker.progress(project_id)?;
        let files = self.layout.scan(project_id);

        Ok(Checkpoint {
            id: CheckpointId::new(),
            version: SCHEMA_VERSION,
            created_at: Utc::now().to_rfc3339(),
            project,
            workflow: WorkflowSnapshot {
                steps: step_list,
                progress,
            },
            files,
        })
    }

    /// Serialize a checkpoint to its deterministic location.
    ///
    /// The filename embeds project id and capture timestamp; `suffix`
    /// disambiguates concurrent writers within the same second. The write
    /// goes through a temp file in the same directory and is renamed into
    /// place on completion.
    pub fn save_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        suffix: Option<&str>,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.checkpoint_dir)?;

        let captured: DateTime<Utc> = checkpoint.created_at.parse().map_err(|e| {
            Error::recovery(format!("checkpoint has unparseable created_at: {e}"))
        })?;
        let mut name = format!(
            "{}_{}",
            checkpoint.project.id,
            captured.format(FILENAME_TS_FORMAT)
        );
        if let Some(s) = suffix {
            name.push('_');
            name.push_str(s);
        }
        name.push_str(".json");
        let path = self.checkpoint_dir.join(name);

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| Error::recovery(format!("failed to serialize checkpoint: {e}")))?;

        let tmp = tempfile::NamedTempFile::new_in(&self.checkpoint_dir)?;
        std::fs::write(tmp.path(), json)?;
        tmp.persist(&path)
            .map_err(|e| Error::recovery(format!("failed to persist checkpoint: {e}")))?;

        tracing::info!("Saved checkpoint {}", path.display());
        Ok(path)
    }

    // -- load & validate ----------------------------------------------------

    /// Load and validate a checkpoint document.
    ///
    /// # Errors
    ///
    /// [`Error::Recovery`] on a missing file, malformed JSON, or a document
    /// that fails [`validate_checkpoint`](Self::validate_checkpoint).
    pub fn load_checkpoint(&self, path: &Path) -> Result<Checkpoint> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::recovery(format!("cannot read checkpoint {}: {e}", path.display()))
        })?;
        let raw: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            Error::recovery(format!("malformed checkpoint {}: {e}", path.display()))
        })?;

        let report = Self::validate_checkpoint(&raw);
        if !report.valid {
            return Err(Error::recovery(format!(
                "invalid checkpoint {}: {}",
                path.display(),
                report.errors.join("; ")
            )));
        }

        serde_json::from_value(raw).map_err(|e| {
            Error::recovery(format!("cannot decode checkpoint {}: {e}", path.display()))
        })
    }

    /// Check the structural invariants of a raw checkpoint document,
    /// accumulating every violation instead of failing fast.
    pub fn validate_checkpoint(raw: &serde_json::Value) -> ValidationReport {
        let mut errors = Vec::new();

        match raw.get("project") {
            Some(project) => {
                for field in ["id", "theme", "status"] {
                    if project.get(field).is_none() {
                        errors.push(format!("project block is missing '{field}'"));
                    }
                }
            }
            None => errors.push("missing project block".to_string()),
        }

        match raw.get("workflow") {
            Some(workflow) => {
                if !workflow.get("steps").is_some_and(|s| s.is_array()) {
                    errors.push("workflow block has no steps list".to_string());
                }
            }
            None => errors.push("missing workflow block".to_string()),
        }

        match raw.get("created_at").and_then(|v| v.as_str()) {
            Some(ts) => {
                if ts.parse::<DateTime<Utc>>().is_err() {
                    errors.push(format!("created_at is not a valid timestamp: {ts}"));
                }
            }
            None => errors.push("missing created_at".to_string()),
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    // -- restore ------------------------------------------------------------

    /// Replay a checkpoint's step states onto a project, atomically.
    ///
    /// Every captured step is driven back to its recorded status by replaying
    /// the matching transition sequence with the recorded timestamps and
    /// payloads, then the recorded retry_count is reapplied verbatim. All
    /// replays happen in one transaction: a failure rolls back the entire
    /// restoration, leaving prior state untouched.
    ///
    /// # Errors
    ///
    /// [`Error::Recovery`] if the checkpoint belongs to a different project
    /// or any replay step fails.
    pub fn restore_from_checkpoint(
        &self,
        project_id: ProjectId,
        checkpoint: &Checkpoint,
    ) -> Result<Vec<StepState>> {
        if checkpoint.project.id != project_id {
            return Err(Error::recovery(format!(
                "checkpoint belongs to project {}, not {}",
                checkpoint.project.id, project_id
            )));
        }

        let conn = get_conn(self.tracker.pool())?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        for snap in &checkpoint.workflow.steps {
            replay_step(&tx, project_id, snap)
                .map_err(|e| Error::recovery(format!("restore of step {} failed: {e}", snap.step_number)))?;
        }

        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        self.tracker.list_steps(project_id)
    }

    // -- listing & pruning ---------------------------------------------------

    /// All checkpoint files for a project, newest first by capture time.
    ///
    /// Capture time is read from each document's `created_at`, not file
    /// mtime, so copied checkpoint directories keep their history order.
    /// Unreadable or malformed files are skipped with a warning.
    pub fn list_checkpoints(&self, project_id: ProjectId) -> Result<Vec<(PathBuf, DateTime<Utc>)>> {
        let prefix = format!("{project_id}_");
        let mut found = Vec::new();

        let entries = match std::fs::read_dir(&self.checkpoint_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }

            let path = entry.path();
            match read_capture_time(&path) {
                Ok(ts) => found.push((path, ts)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable checkpoint {}: {e}", path.display());
                }
            }
        }

        found.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(found)
    }

    /// Delete all but the `keep` newest checkpoints for a project.
    ///
    /// Individual deletion failures are logged and skipped; the returned
    /// count covers files actually removed.
    pub fn prune_checkpoints(&self, project_id: ProjectId, keep: usize) -> Result<usize> {
        let all = self.list_checkpoints(project_id)?;
        let mut deleted = 0;

        for (path, _) in all.into_iter().skip(keep) {
            match std::fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!("Failed to delete checkpoint {}: {e}", path.display());
                }
            }
        }

        Ok(deleted)
    }
}

/// Drive one step row back to its captured state.
fn replay_step(conn: &rusqlite::Connection, project_id: ProjectId, snap: &StepState) -> Result<()> {
    let n = snap.step_number;
    if steps::get_by_number(conn, project_id, n)?.is_none() {
        return Err(Error::step_not_found(project_id, n));
    }

    // Start from a clean row so the replay is a pure function of the snapshot.
    steps::reset_step(conn, project_id, n)?;

    let input = payload_str(&snap.input_data)?;
    let output = payload_str(&snap.output_data)?;
    let started = snap.started_at.as_deref().unwrap_or_default();
    let completed = snap.completed_at.as_deref().unwrap_or_default();

    match snap.status {
        StepStatus::Pending => {}
        StepStatus::Running => {
            steps::mark_started(conn, project_id, n, input.as_deref(), started)?;
        }
        StepStatus::Completed => {
            steps::mark_started(conn, project_id, n, input.as_deref(), started)?;
            steps::mark_completed(conn, project_id, n, output.as_deref(), completed)?;
        }
        StepStatus::Failed => {
            steps::mark_started(conn, project_id, n, input.as_deref(), started)?;
            steps::mark_failed(
                conn,
                project_id,
                n,
                snap.error_message.as_deref().unwrap_or_default(),
            )?;
        }
        StepStatus::Skipped => {
            // A step skipped after it was started keeps its start record.
            if snap.started_at.is_some() {
                steps::mark_started(conn, project_id, n, input.as_deref(), started)?;
            }
            steps::mark_skipped(
                conn,
                project_id,
                n,
                snap.error_message.as_deref().unwrap_or_default(),
                completed,
            )?;
        }
    }

    // Transitions never clear output_data, so a step that was skipped or
    // restarted after completing still carries its recorded output. The
    // status replay above cannot produce that; reapply the column verbatim.
    steps::set_output_data(conn, project_id, n, output.as_deref())?;
    steps::set_retry_count(conn, project_id, n, snap.retry_count)?;
    Ok(())
}

/// Serialize an opaque payload back to its stored TEXT form.
fn payload_str(value: &Option<serde_json::Value>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(|e| Error::database(e.to_string())))
        .transpose()
}

/// Parse a checkpoint file just far enough to get its capture time.
fn read_capture_time(path: &Path) -> Result<DateTime<Utc>> {
    let contents = std::fs::read_to_string(path)?;
    let raw: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| Error::recovery(format!("malformed checkpoint: {e}")))?;
    raw.get("created_at")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::recovery("checkpoint has no parseable created_at".to_string()))
}
