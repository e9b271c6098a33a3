//! Workflow step-state operations.
//!
//! These are the raw row operations against `project_steps`. Transition
//! *semantics* (which statuses may move where, transaction scoping,
//! step-not-found mapping) live in the tracker that calls them; every
//! update here returns whether a row was touched.

use rusqlite::Connection;
use rf_core::{Error, ProjectId, Result, StepStatus};

use crate::models::StepState;

const COLS: &str = "project_id, step_number, step_name, status, started_at,
    completed_at, input_data, output_data, error_message, retry_count";

/// Insert a fresh pending row for one step of a project's workflow.
pub fn insert_step(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    step_name: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO project_steps (project_id, step_number, step_name, status)
         VALUES (?1, ?2, ?3, 'pending')",
        rusqlite::params![project_id.to_string(), step_number, step_name],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Get one step by its ordinal position.
pub fn get_by_number(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
) -> Result<Option<StepState>> {
    let q = format!("SELECT {COLS} FROM project_steps WHERE project_id = ?1 AND step_number = ?2");
    let result = conn.query_row(
        &q,
        rusqlite::params![project_id.to_string(), step_number],
        StepState::from_row,
    );
    match result {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get one step by name.
pub fn get_by_name(
    conn: &Connection,
    project_id: ProjectId,
    step_name: &str,
) -> Result<Option<StepState>> {
    let q = format!("SELECT {COLS} FROM project_steps WHERE project_id = ?1 AND step_name = ?2");
    let result = conn.query_row(
        &q,
        rusqlite::params![project_id.to_string(), step_name],
        StepState::from_row,
    );
    match result {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all steps of a project ordered by step_number.
pub fn list_steps(conn: &Connection, project_id: ProjectId) -> Result<Vec<StepState>> {
    let q = format!(
        "SELECT {COLS} FROM project_steps WHERE project_id = ?1 ORDER BY step_number ASC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([project_id.to_string()], StepState::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// List a project's steps filtered by status, ordered by step_number.
pub fn list_by_status(
    conn: &Connection,
    project_id: ProjectId,
    status: StepStatus,
) -> Result<Vec<StepState>> {
    let q = format!(
        "SELECT {COLS} FROM project_steps
         WHERE project_id = ?1 AND status = ?2 ORDER BY step_number ASC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![project_id.to_string(), status.as_str()],
            StepState::from_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Move a step to `running`: set started_at and input, clear completion state.
pub fn mark_started(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    input_data: Option<&str>,
    now: &str,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps
             SET status='running', started_at=?1, input_data=?2,
                 completed_at=NULL, error_message=NULL
             WHERE project_id=?3 AND step_number=?4",
            rusqlite::params![now, input_data, project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Same as [`mark_started`], additionally incrementing retry_count.
pub fn mark_retried(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    input_data: Option<&str>,
    now: &str,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps
             SET status='running', started_at=?1, input_data=?2,
                 completed_at=NULL, error_message=NULL, retry_count=retry_count+1
             WHERE project_id=?3 AND step_number=?4",
            rusqlite::params![now, input_data, project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Move a step to `completed`: set completed_at and output, clear the error.
pub fn mark_completed(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    output_data: Option<&str>,
    now: &str,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps
             SET status='completed', completed_at=?1, output_data=?2, error_message=NULL
             WHERE project_id=?3 AND step_number=?4",
            rusqlite::params![now, output_data, project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Move a step to `failed`: record the message, clear completed_at.
pub fn mark_failed(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    error_message: &str,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps
             SET status='failed', error_message=?1, completed_at=NULL
             WHERE project_id=?2 AND step_number=?3",
            rusqlite::params![error_message, project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Move a step to `skipped`: the reason lands in error_message.
pub fn mark_skipped(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    reason: &str,
    now: &str,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps
             SET status='skipped', completed_at=?1, error_message=?2
             WHERE project_id=?3 AND step_number=?4",
            rusqlite::params![now, reason, project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Reset a step to a fresh `pending` row.
pub fn reset_step(conn: &Connection, project_id: ProjectId, step_number: i64) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps
             SET status='pending', started_at=NULL, completed_at=NULL,
                 input_data=NULL, output_data=NULL, error_message=NULL, retry_count=0
             WHERE project_id=?1 AND step_number=?2",
            rusqlite::params![project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Overwrite output_data directly. Transitions never clear this column, so
/// a skipped or restarted step can still carry the output of an earlier
/// completion; checkpoint restoration reapplies it verbatim.
pub fn set_output_data(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    output_data: Option<&str>,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps SET output_data=?1 WHERE project_id=?2 AND step_number=?3",
            rusqlite::params![output_data, project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Overwrite retry_count directly. Used by checkpoint restoration to reapply
/// the recorded count verbatim.
pub fn set_retry_count(
    conn: &Connection,
    project_id: ProjectId,
    step_number: i64,
    retry_count: i64,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE project_steps SET retry_count=?1 WHERE project_id=?2 AND step_number=?3",
            rusqlite::params![retry_count, project_id.to_string(), step_number],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::projects::create_project;

    fn setup() -> (crate::pool::DbPool, ProjectId) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let project = create_project(&conn, "t", 1.0, &serde_json::json!({})).unwrap();
        for (i, name) in ["script_generation", "voice_synthesis", "video_assembly"]
            .iter()
            .enumerate()
        {
            insert_step(&conn, project.id, (i + 1) as i64, name).unwrap();
        }
        let id = project.id;
        drop(conn);
        (pool, id)
    }

    #[test]
    fn insert_and_list_in_order() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        let steps = list_steps(&conn, id).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[2].step_name, "video_assembly");
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn get_by_number_and_name() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        let by_num = get_by_number(&conn, id, 2).unwrap().unwrap();
        assert_eq!(by_num.step_name, "voice_synthesis");

        let by_name = get_by_name(&conn, id, "voice_synthesis").unwrap().unwrap();
        assert_eq!(by_name.step_number, 2);

        assert!(get_by_number(&conn, id, 99).unwrap().is_none());
        assert!(get_by_name(&conn, id, "no_such_step").unwrap().is_none());
    }

    #[test]
    fn start_complete_cycle() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        assert!(mark_started(&conn, id, 1, Some(r#"{"theme":"x"}"#), "2026-01-01T00:00:00+00:00")
            .unwrap());
        let running = get_by_number(&conn, id, 1).unwrap().unwrap();
        assert_eq!(running.status, StepStatus::Running);
        assert_eq!(running.input_data, Some(serde_json::json!({"theme": "x"})));
        assert!(running.started_at.is_some());

        assert!(mark_completed(&conn, id, 1, Some(r#"{"path":"s.json"}"#), "2026-01-01T00:01:00+00:00")
            .unwrap());
        let done = get_by_number(&conn, id, 1).unwrap().unwrap();
        assert_eq!(done.status, StepStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.error_message.is_none());
    }

    #[test]
    fn fail_then_retry_increments_count() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        mark_started(&conn, id, 2, None, "2026-01-01T00:00:00+00:00").unwrap();
        assert!(mark_failed(&conn, id, 2, "boom").unwrap());
        let failed = get_by_number(&conn, id, 2).unwrap().unwrap();
        assert_eq!(failed.status, StepStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));

        assert!(mark_retried(&conn, id, 2, Some("{}"), "2026-01-01T00:02:00+00:00").unwrap());
        let retried = get_by_number(&conn, id, 2).unwrap().unwrap();
        assert_eq!(retried.status, StepStatus::Running);
        assert_eq!(retried.retry_count, 1);
        assert!(retried.error_message.is_none());
    }

    #[test]
    fn skip_and_reset() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        assert!(mark_skipped(&conn, id, 3, "not needed", "2026-01-01T00:00:00+00:00").unwrap());
        let skipped = get_by_number(&conn, id, 3).unwrap().unwrap();
        assert_eq!(skipped.status, StepStatus::Skipped);
        assert_eq!(skipped.error_message.as_deref(), Some("not needed"));

        assert!(reset_step(&conn, id, 3).unwrap());
        let reset = get_by_number(&conn, id, 3).unwrap().unwrap();
        assert_eq!(reset.status, StepStatus::Pending);
        assert!(reset.started_at.is_none());
        assert!(reset.error_message.is_none());
        assert_eq!(reset.retry_count, 0);
    }

    #[test]
    fn updates_on_missing_row_touch_nothing() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        assert!(!mark_started(&conn, id, 42, None, "2026-01-01T00:00:00+00:00").unwrap());
        assert!(!mark_failed(&conn, id, 42, "x").unwrap());
        assert!(!reset_step(&conn, id, 42).unwrap());
    }

    #[test]
    fn list_by_status_filters() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        mark_started(&conn, id, 1, None, "2026-01-01T00:00:00+00:00").unwrap();
        mark_failed(&conn, id, 1, "x").unwrap();

        let failed = list_by_status(&conn, id, StepStatus::Failed).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].step_number, 1);

        let pending = list_by_status(&conn, id, StepStatus::Pending).unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn set_output_data_verbatim() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        // Output survives a skip; the setter can also rewrite it directly.
        mark_started(&conn, id, 1, None, "2026-01-01T00:00:00+00:00").unwrap();
        mark_completed(&conn, id, 1, Some(r#"{"a":1}"#), "2026-01-01T00:01:00+00:00").unwrap();
        mark_skipped(&conn, id, 1, "redone", "2026-01-01T00:02:00+00:00").unwrap();
        let s = get_by_number(&conn, id, 1).unwrap().unwrap();
        assert_eq!(s.output_data, Some(serde_json::json!({"a": 1})));

        assert!(set_output_data(&conn, id, 1, Some(r#"{"b":2}"#)).unwrap());
        let s = get_by_number(&conn, id, 1).unwrap().unwrap();
        assert_eq!(s.output_data, Some(serde_json::json!({"b": 2})));

        assert!(set_output_data(&conn, id, 1, None).unwrap());
        let s = get_by_number(&conn, id, 1).unwrap().unwrap();
        assert!(s.output_data.is_none());
    }

    #[test]
    fn set_retry_count_verbatim() {
        let (pool, id) = setup();
        let conn = pool.get().unwrap();

        assert!(set_retry_count(&conn, id, 1, 7).unwrap());
        let s = get_by_number(&conn, id, 1).unwrap().unwrap();
        assert_eq!(s.retry_count, 7);
    }
}
