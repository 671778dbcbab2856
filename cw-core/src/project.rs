use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};

/// File name of the docker build log inside a project's log directory.
pub const DOCKER_BUILD_LOG: &str = "docker.build.log";

/// How a project is launched once its build succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StartMode {
    Run,
    Debug,
    DebugNoInit,
}

impl Default for StartMode {
    fn default() -> Self {
        Self::Run
    }
}

/// Canonical per-project record, persisted as one JSON document.
///
/// `project_id`, `project_type` and `location` are always present for a
/// registered project; `app_ports` holds at most the status-ping port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub project_type: String,
    pub location: PathBuf,
    #[serde(
        rename = "extensionID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extension_id: Option<String>,
    #[serde(default = "default_auto_build")]
    pub auto_build_enabled: bool,
    #[serde(default)]
    pub start_mode: StartMode,
    #[serde(default)]
    pub app_ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven_profiles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven_properties: Option<Vec<String>>,
}

fn default_auto_build() -> bool {
    true
}

impl ProjectInfo {
    pub fn new(
        project_id: impl Into<String>,
        project_type: impl Into<String>,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            project_type: project_type.into(),
            location: location.into(),
            extension_id: None,
            auto_build_enabled: true,
            start_mode: StartMode::default(),
            app_ports: Vec::new(),
            debug_port: None,
            context_root: None,
            health_check: None,
            watched_files: None,
            ignored_files: None,
            ignored_paths: None,
            maven_profiles: None,
            maven_properties: None,
        }
    }

    /// Project name, derived from the last component of the location.
    pub fn name(&self) -> String {
        self.location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.project_id.clone())
    }

    /// Replaces the single app-port slot, keeping at most one entry.
    pub fn set_app_port(&mut self, port: impl Into<String>) {
        self.app_ports.clear();
        self.app_ports.push(port.into());
    }

    /// Deterministic image identifier handed to handlers:
    /// `<projectID>-<projectType>-<sha1 of the location>`.
    pub fn image_name(&self) -> String {
        let digest = Sha1::digest(self.location.to_string_lossy().as_bytes());
        format!(
            "{}-{}-{}",
            self.project_id,
            self.project_type,
            hex::encode(digest)
        )
    }

    /// Name of the project's directory under the logs root.
    pub fn log_dir_name(&self) -> String {
        format!("{}-{}", self.name(), self.project_id)
    }
}

/// On-disk locations derived from a project id and the fixed data roots.
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    pub project_id: String,
    /// `<dataRoot>/<projectID>/`
    pub dir: PathBuf,
    /// `<dataRoot>/<projectID>/<projectID>.json`
    pub info_file: PathBuf,
    /// Root under which per-project log directories live.
    pub log_root: PathBuf,
}

impl ProjectMetadata {
    pub fn new(project_id: &str, data_root: &Path, log_root: &Path) -> Self {
        let dir = data_root.join(project_id);
        let info_file = dir.join(format!("{project_id}.json"));
        Self {
            project_id: project_id.to_string(),
            dir,
            info_file,
            log_root: log_root.to_path_buf(),
        }
    }
}

/// Normalises a context-root or health-check path to exactly one leading
/// slash and no trailing slash. `" //foo// "` becomes `/foo`.
pub fn normalize_context_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    format!("/{trimmed}")
}
