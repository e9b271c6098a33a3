//! Project metadata operations.

use chrono::Utc;
use rusqlite::Connection;
use rf_core::{Error, ProjectId, ProjectStatus, Result};

use crate::models::Project;

const COLS: &str = "id, theme, target_length_minutes, status, config, created_at, updated_at";

/// Create a new project in status `created`.
pub fn create_project(
    conn: &Connection,
    theme: &str,
    target_length_minutes: f64,
    config: &serde_json::Value,
) -> Result<Project> {
    let id = ProjectId::new();
    let now = Utc::now().to_rfc3339();
    let config_json =
        serde_json::to_string(config).map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "INSERT INTO projects (id, theme, target_length_minutes, status, config, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'created', ?4, ?5, ?5)",
        rusqlite::params![id.to_string(), theme, target_length_minutes, config_json, &now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Project {
        id,
        theme: theme.to_string(),
        target_length_minutes,
        status: ProjectStatus::Created,
        config: config.clone(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get a project by ID.
pub fn get_project(conn: &Connection, id: ProjectId) -> Result<Option<Project>> {
    let q = format!("SELECT {COLS} FROM projects WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], Project::from_row);
    match result {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all projects, oldest first.
pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let q = format!("SELECT {COLS} FROM projects ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Project::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// List projects filtered by status, oldest first.
pub fn list_by_status(conn: &Connection, status: ProjectStatus) -> Result<Vec<Project>> {
    let q = format!("SELECT {COLS} FROM projects WHERE status = ?1 ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([status.as_str()], Project::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Update a project's status, bumping `updated_at`.
pub fn set_status(conn: &Connection, id: ProjectId, status: ProjectStatus) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE projects SET status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), &now, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn create_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let project =
            create_project(&conn, "space documentary", 3.0, &serde_json::json!({})).unwrap();
        assert_eq!(project.status, ProjectStatus::Created);

        let found = get_project(&conn, project.id).unwrap().unwrap();
        assert_eq!(found.theme, "space documentary");
        assert!((found.target_length_minutes - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn get_missing_is_none() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        assert!(get_project(&conn, ProjectId::new()).unwrap().is_none());
    }

    #[test]
    fn status_update_and_filter() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let a = create_project(&conn, "a", 1.0, &serde_json::json!({})).unwrap();
        let _b = create_project(&conn, "b", 1.0, &serde_json::json!({})).unwrap();

        assert!(set_status(&conn, a.id, ProjectStatus::Interrupted).unwrap());

        let interrupted = list_by_status(&conn, ProjectStatus::Interrupted).unwrap();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].id, a.id);

        let all = list_projects(&conn).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn set_status_on_missing_project() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        assert!(!set_status(&conn, ProjectId::new(), ProjectStatus::Running).unwrap());
    }

    #[test]
    fn config_blob_round_trips() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let cfg = serde_json::json!({"voice": "narrator", "resolution": [1920, 1080]});
        let project = create_project(&conn, "themed", 2.5, &cfg).unwrap();
        let found = get_project(&conn, project.id).unwrap().unwrap();
        assert_eq!(found.config, cfg);
    }
}
