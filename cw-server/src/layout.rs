use anyhow::{Context, Result};
use cw_core::project::{ProjectMetadata, DOCKER_BUILD_LOG};
use std::path::{Path, PathBuf};
use tracing::info;

/// Fixed on-disk roots the daemon works against.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    /// Root directory holding user projects; also the watcher's origin.
    pub workspace: PathBuf,
    /// Per-project metadata directories (`<data_dir>/<projectID>/`).
    pub data_dir: PathBuf,
    /// Per-project log directories (`<logs_dir>/<name>-<projectID>/`).
    pub logs_dir: PathBuf,
    /// The project-watcher shell script spawned per project.
    pub watcher_script: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(workspace: PathBuf, data_dir: PathBuf) -> Self {
        let logs_dir = workspace.join(".logs");
        let watcher_script = workspace.join("scripts").join("project-watcher.sh");
        Self {
            workspace,
            data_dir,
            logs_dir,
            watcher_script,
        }
    }

    /// Layout rooted at the user's data directory.
    pub fn discover(workspace: PathBuf) -> Result<Self> {
        let dirs = directories::ProjectDirs::from("com", "cw", "cw")
            .context("could not determine project directories")?;
        let data_dir = dirs.data_dir().join("projects");
        std::fs::create_dir_all(&data_dir)?;
        info!("project data directory: {}", data_dir.display());
        Ok(Self::new(workspace, data_dir))
    }

    pub fn metadata(&self, project_id: &str) -> ProjectMetadata {
        ProjectMetadata::new(project_id, &self.data_dir, &self.logs_dir)
    }

    pub fn project_log_dir(&self, log_dir_name: &str) -> PathBuf {
        self.logs_dir.join(log_dir_name)
    }
}

/// Deterministic docker-build log path reported back on create:
/// `<location>/../.logs/<logDirName>/docker.build.log`.
pub fn build_log_path(location: &Path, log_dir_name: &str) -> PathBuf {
    location
        .parent()
        .unwrap_or(location)
        .join(".logs")
        .join(log_dir_name)
        .join(DOCKER_BUILD_LOG)
}
