//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use rf_core::{Error, Result};

/// V1: initial schema -- projects and their per-step workflow state.
const V1_INITIAL: &str = r#"
-- Projects
CREATE TABLE projects (
    id                    TEXT PRIMARY KEY,
    theme                 TEXT NOT NULL,
    target_length_minutes REAL NOT NULL,
    status                TEXT NOT NULL DEFAULT 'created',
    config                TEXT NOT NULL DEFAULT '{}',
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

-- One row per (project, step ordinal)
CREATE TABLE project_steps (
    project_id    TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    step_number   INTEGER NOT NULL,
    step_name     TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',
    started_at    TEXT,
    completed_at  TEXT,
    input_data    TEXT,
    output_data   TEXT,
    error_message TEXT,
    retry_count   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (project_id, step_number)
);

-- Indexes
CREATE INDEX idx_projects_status      ON projects(status);
CREATE INDEX idx_project_steps_status ON project_steps(project_id, status);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit()
            .map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}
