//! On-disk project layout and the integrity scan over it.
//!
//! Every project owns a directory tree under the workspace root with a fixed
//! set of subdirectories, one per kind of generated artifact. The scan
//! reports presence and recursive file counts; it never fails on a missing
//! directory, it records the absence.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;
use crate::ids::ProjectId;

/// Subdirectories every project tree is expected to contain.
pub const REQUIRED_SUBDIRS: &[&str] = &[
    "scripts",
    "audio",
    "video",
    "images",
    "subtitles",
    "metadata",
    "config",
    "logs",
    "cache",
];

/// Presence and file count for one expected subdirectory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirReport {
    pub name: String,
    pub exists: bool,
    pub file_count: u64,
}

/// Result of scanning a project's directory tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileIntegrity {
    /// Whether the project root directory itself exists.
    pub root_exists: bool,
    /// One report per entry in [`REQUIRED_SUBDIRS`], in order.
    pub directories: Vec<DirReport>,
    /// Total files found across all subdirectories.
    pub total_files: u64,
}

/// Resolver for project directories under a fixed workspace root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    workspace_root: PathBuf,
}

impl ProjectLayout {
    /// Create a layout rooted at `workspace_root`.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    /// The root directory for one project.
    pub fn project_root(&self, project_id: ProjectId) -> PathBuf {
        self.workspace_root.join(project_id.to_string())
    }

    /// Path to one named subdirectory of a project.
    pub fn subdir(&self, project_id: ProjectId, name: &str) -> PathBuf {
        self.project_root(project_id).join(name)
    }

    /// Create the project root and every required subdirectory.
    pub fn ensure_layout(&self, project_id: ProjectId) -> Result<PathBuf> {
        let root = self.project_root(project_id);
        for name in REQUIRED_SUBDIRS {
            std::fs::create_dir_all(root.join(name))?;
        }
        Ok(root)
    }

    /// Scan a project's tree, reporting per-directory presence and file counts.
    pub fn scan(&self, project_id: ProjectId) -> FileIntegrity {
        let root = self.project_root(project_id);
        let root_exists = root.is_dir();

        let mut directories = Vec::with_capacity(REQUIRED_SUBDIRS.len());
        let mut total_files = 0u64;

        for name in REQUIRED_SUBDIRS {
            let dir = root.join(name);
            let exists = dir.is_dir();
            let file_count = if exists { count_files(&dir) } else { 0 };
            total_files += file_count;
            directories.push(DirReport {
                name: (*name).to_string(),
                exists,
                file_count,
            });
        }

        FileIntegrity {
            root_exists,
            directories,
            total_files,
        }
    }
}

/// Count regular files under `dir`, recursively. Unreadable entries are skipped.
fn count_files(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count() as u64
}
