//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! paths and retention policy the workflow core needs. Every field defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory under which each project gets its own output tree.
    pub workspace_root: PathBuf,
    /// Directory where checkpoint documents are written.
    pub checkpoint_dir: PathBuf,
    /// How many checkpoints to keep per project when auto-saving.
    pub checkpoint_retention: usize,
    /// Database file path.
    pub database_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("projects"),
            checkpoint_dir: PathBuf::from("checkpoints"),
            checkpoint_retention: 5,
            database_path: PathBuf::from("reelforge.db"),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit (async, embedded, etc.).
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.checkpoint_retention == 0 {
            warnings.push(
                "checkpoint_retention is 0; every auto-save will delete all prior checkpoints"
                    .into(),
            );
        }
        if self.workspace_root.as_os_str().is_empty() {
            warnings.push("workspace_root is empty".into());
        }
        if self.checkpoint_dir.as_os_str().is_empty() {
            warnings.push("checkpoint_dir is empty".into());
        }

        warnings
    }
}
