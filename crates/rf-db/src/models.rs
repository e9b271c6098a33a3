//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`. Models also derive serde so they can be embedded
//! verbatim in checkpoint documents.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use rf_core::{ProjectId, ProjectStatus, StepStatus};

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

/// Parse an enum stored as lowercase TEXT.
fn parse_status<T: FromStr>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse an optional JSON payload column. NULL maps to `None`.
fn parse_opt_json(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => serde_json::from_str(&v).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub theme: String,
    pub target_length_minutes: f64,
    pub status: ProjectStatus,
    pub config: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

impl Project {
    /// Build from a row selected as:
    /// id, theme, target_length_minutes, status, config, created_at, updated_at
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let config_json: String = row.get(4)?;
        Ok(Self {
            id: parse_id(row, 0)?,
            theme: row.get(1)?,
            target_length_minutes: row.get(2)?,
            status: parse_status(row, 3)?,
            config: serde_json::from_str(&config_json)
                .unwrap_or(serde_json::Value::Object(Default::default())),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// StepState
// ---------------------------------------------------------------------------

/// Persisted state of one step instance within a project's workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepState {
    pub project_id: ProjectId,
    pub step_number: i64,
    pub step_name: String,
    pub status: StepStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub input_data: Option<serde_json::Value>,
    pub output_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_count: i64,
}

impl StepState {
    /// Build from a row selected as:
    /// project_id, step_number, step_name, status, started_at, completed_at,
    /// input_data, output_data, error_message, retry_count
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            project_id: parse_id(row, 0)?,
            step_number: row.get(1)?,
            step_name: row.get(2)?,
            status: parse_status(row, 3)?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            input_data: parse_opt_json(row, 6)?,
            output_data: parse_opt_json(row, 7)?,
            error_message: row.get(8)?,
            retry_count: row.get::<_, i64>(9).unwrap_or(0),
        })
    }
}
