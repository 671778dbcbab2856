use crate::layout::{build_log_path, WorkspaceLayout};
use crate::scheduler::{missing_required_file, BuildQueueEntry, BuildScheduler};
use crate::store::{InfoStore, InfoUpdate};
use crate::watcher::WatcherSupervisor;
use cw_core::error::LifecycleError;
use cw_core::event::{DeletionStatus, Event, EventBus};
use cw_core::handler::{HandlerRegistry, LogKind};
use cw_core::locale::{keys, LocaleTranslator};
use cw_core::operation::{Operation, OperationKind};
use cw_core::project::{ProjectInfo, StartMode};
use cw_core::settings::{merge_project_info, ProjectSettings};
use cw_core::status::{BuildState, StatusController};
use cw_utils::fs::remove_tree;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Names accepted by the action endpoint.
const ACTIONS: [&str; 5] = [
    "build",
    "validate",
    "enableautobuild",
    "disableautobuild",
    "reconfigWatchedFiles",
];

/// Log polling budget for `check_new_log_file`.
const LOG_POLL_ATTEMPTS: u32 = 10;
const LOG_POLL_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub project_type: String,
    pub location: PathBuf,
    #[serde(default)]
    pub start_mode: Option<StartMode>,
    #[serde(rename = "extensionID", default)]
    pub extension_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
}

/// Accepted (202) reply for the asynchronous entry points.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub status_code: u16,
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_log_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBundle {
    pub app: Vec<PathBuf>,
    pub build: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub status_code: u16,
    pub logs: LogBundle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogListResponse {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<PathBuf>>,
}

/// Top-level lifecycle operations.
///
/// Validates requests, materialises project records, and drives the info
/// store, the watcher supervisor and the build scheduler. No lock is held
/// across a call into another component.
#[derive(Clone)]
pub struct Lifecycle {
    layout: WorkspaceLayout,
    store: Arc<InfoStore>,
    registry: Arc<HandlerRegistry>,
    status: Arc<dyn StatusController>,
    scheduler: Arc<BuildScheduler>,
    watchers: Arc<WatcherSupervisor>,
    events: Arc<dyn EventBus>,
    translator: Arc<dyn LocaleTranslator>,
    projects: Arc<Mutex<HashSet<String>>>,
    log_lists: Arc<Mutex<HashMap<String, HashMap<LogKind, Vec<PathBuf>>>>>,
}

impl Lifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        layout: WorkspaceLayout,
        store: Arc<InfoStore>,
        registry: Arc<HandlerRegistry>,
        status: Arc<dyn StatusController>,
        scheduler: Arc<BuildScheduler>,
        watchers: Arc<WatcherSupervisor>,
        events: Arc<dyn EventBus>,
        translator: Arc<dyn LocaleTranslator>,
    ) -> Self {
        Self {
            layout,
            store,
            registry,
            status,
            scheduler,
            watchers,
            events,
            translator,
            projects: Arc::new(Mutex::new(HashSet::new())),
            log_lists: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a project and queues its first build.
    pub async fn create(&self, req: CreateRequest) -> Result<Accepted, LifecycleError> {
        if req.project_id.is_empty()
            || req.project_type.is_empty()
            || req.location.as_os_str().is_empty()
        {
            return Err(LifecycleError::bad_request(
                "projectID, projectType and location are required",
            ));
        }

        let settings = read_settings(&req.location).await;

        let mut base = ProjectInfo::new(&req.project_id, &req.project_type, &req.location);
        base.extension_id = req.extension_id.clone();

        let meta = self.layout.metadata(&req.project_id);
        let log_dir = self.layout.project_log_dir(&base.log_dir_name());
        tokio::fs::create_dir_all(&log_dir).await?;

        if let Some(prior) = self.store.load(&meta.info_file, true).await {
            if prior.project_type != req.project_type || prior.location != req.location {
                return Err(LifecycleError::Conflict(format!(
                    "project {} already exists as a {} project at {}",
                    req.project_id,
                    prior.project_type,
                    prior.location.display()
                )));
            }
            // Re-creation of the same project: clear out its old children
            // before the new build starts.
            info!("re-creating {}", req.project_id);
            self.watchers.stop(&prior.project_id, &prior.location).await;
        }

        match tokio::fs::metadata(&req.location).await {
            Ok(m) if m.is_dir() => {}
            _ => {
                return Err(LifecycleError::not_found(format!(
                    "location {} does not exist",
                    req.location.display()
                )))
            }
        }

        let handler = self.registry.handler_for_type(&req.project_type)?;

        let mut info = merge_project_info(base, handler.as_ref(), &settings);
        if let Some(mode) = req.start_mode {
            if !handler.capabilities().supports(mode) {
                return Err(LifecycleError::bad_request(format!(
                    "start mode {mode:?} is not supported by {} projects",
                    req.project_type
                )));
            }
            info.start_mode = mode;
        }

        tokio::fs::create_dir_all(&meta.dir).await?;
        self.store.save(&meta, &info, true).await;

        self.status.add_project(&info.project_id).await;
        self.projects.lock().await.insert(info.project_id.clone());

        let operation = Operation::new(OperationKind::Create, info.clone());
        let operation_id = operation.operation_id.clone();
        self.scheduler
            .enqueue(BuildQueueEntry { operation, handler })
            .await;
        self.scheduler.emit_ranks().await;
        self.scheduler.request_tick();

        Ok(Accepted {
            status_code: 202,
            operation_id,
            build_log_path: Some(build_log_path(&req.location, &info.log_dir_name())),
            image_name: Some(info.image_name()),
        })
    }

    /// Unregisters a project. The reply is immediate; the teardown runs in
    /// the background and reports through the `projectDeletion` event.
    pub async fn delete(&self, project_id: &str) -> Result<Accepted, LifecycleError> {
        if project_id.is_empty() {
            return Err(LifecycleError::bad_request("projectID is required"));
        }

        let meta = self.layout.metadata(project_id);
        let info = self
            .store
            .load(&meta.info_file, true)
            .await
            .ok_or_else(|| {
                LifecycleError::not_found(format!("project {project_id} does not exist"))
            })?;

        let operation = Operation::new(OperationKind::Delete, info);
        let operation_id = operation.operation_id.clone();

        let removal = self.scheduler.remove(project_id).await;
        if removal.from_queue {
            self.scheduler.emit_ranks().await;
        }
        if removal.from_running {
            // A slot freed up; let the next queued build in.
            self.scheduler.request_tick();
        }

        let this = self.clone();
        tokio::spawn(async move { this.run_project_deletion(operation).await });

        Ok(Accepted {
            status_code: 202,
            operation_id,
            build_log_path: None,
            image_name: None,
        })
    }

    async fn run_project_deletion(&self, operation: Operation) {
        let info = operation.project_info.clone();
        let project_id = info.project_id.clone();

        match self.project_deletion_steps(&info).await {
            Ok(()) => {
                info!("deleted project {project_id}");
                self.events.emit(Event::ProjectDeletion {
                    operation_id: operation.operation_id,
                    project_id,
                    status: DeletionStatus::Success,
                    error: None,
                });
            }
            Err(e) => {
                error!("failed to delete project {project_id}: {e:#}");
                self.events.emit(Event::ProjectDeletion {
                    operation_id: operation.operation_id,
                    project_id,
                    status: DeletionStatus::Failed,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    async fn project_deletion_steps(&self, info: &ProjectInfo) -> anyhow::Result<()> {
        let project_id = &info.project_id;

        self.status.delete_project(project_id).await;
        self.projects.lock().await.remove(project_id);
        self.watchers.stop(project_id, &info.location).await;

        // A failing handler decides the reported status but never
        // short-circuits the teardown: the metadata directory, the caches
        // and the log directory go away regardless.
        let mut outcome: anyhow::Result<()> = match self.registry.handler_for(info) {
            Ok(handler) => handler.delete_container(info).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &outcome {
            error!("handler failed to delete the container of {project_id}: {e:#}");
        }

        let meta = self.layout.metadata(project_id);
        if let Err(e) = remove_tree(&meta.dir).await {
            error!("failed to remove {}: {e:#}", meta.dir.display());
            outcome = outcome.and(Err(e));
        }
        self.store.evict(&meta.info_file).await;

        if let Err(e) = remove_tree(&self.layout.project_log_dir(&info.log_dir_name())).await {
            error!("failed to remove the log directory of {project_id}: {e:#}");
            outcome = outcome.and(Err(e));
        }
        self.log_lists.lock().await.remove(project_id);

        outcome
    }

    /// Runs one of the named project actions.
    pub async fn action(&self, req: ActionRequest) -> Result<ActionResponse, LifecycleError> {
        if !ACTIONS.contains(&req.action.as_str()) {
            return Err(LifecycleError::bad_request(format!(
                "unknown action {}",
                req.action
            )));
        }
        if req.project_id.is_empty() {
            return Err(LifecycleError::bad_request("projectID is required"));
        }

        let meta = self.layout.metadata(&req.project_id);
        let info = self
            .store
            .load(&meta.info_file, true)
            .await
            .ok_or_else(|| {
                LifecycleError::not_found(format!("project {} does not exist", req.project_id))
            })?;

        match req.action.as_str() {
            "build" => {
                let handler = self.registry.handler_for(&info)?;
                let operation = Operation::new(OperationKind::Build, info);
                let operation_id = operation.operation_id.clone();
                let added = self
                    .scheduler
                    .enqueue(BuildQueueEntry { operation, handler })
                    .await;
                if added {
                    self.scheduler.emit_ranks().await;
                }
                self.scheduler.request_tick();
                Ok(ActionResponse {
                    status_code: 202,
                    operation_id: Some(operation_id),
                })
            }
            "validate" => {
                let handler = self.registry.handler_for(&info)?;
                let operation = Operation::new(OperationKind::Validate, info.clone());
                let operation_id = operation.operation_id.clone();

                let status = self.status.clone();
                let translator = self.translator.clone();
                tokio::spawn(async move {
                    let required = handler.required_files();
                    if let Some(missing) = missing_required_file(&info.location, &required) {
                        let message = translator
                            .translation(keys::BUILD_FAIL_MISSING_FILE, &[("file", &missing)]);
                        status
                            .update_build_status(
                                &info.project_id,
                                BuildState::Failed,
                                keys::BUILD_FAIL_MISSING_FILE,
                                Some(message),
                            )
                            .await;
                    }
                });
                Ok(ActionResponse {
                    status_code: 202,
                    operation_id: Some(operation_id),
                })
            }
            "enableautobuild" => {
                let operation = Operation::new(OperationKind::EnableAutoBuild, info);
                self.store.update(&meta, InfoUpdate::AutoBuild(true)).await;
                Ok(ActionResponse {
                    status_code: 202,
                    operation_id: Some(operation.operation_id),
                })
            }
            "disableautobuild" => {
                self.store.update(&meta, InfoUpdate::AutoBuild(false)).await;
                Ok(ActionResponse {
                    status_code: 200,
                    operation_id: None,
                })
            }
            "reconfigWatchedFiles" => {
                self.watchers.stop(&info.project_id, &info.location).await;
                self.watchers.launch(&info).await?;
                Ok(ActionResponse {
                    status_code: 200,
                    operation_id: None,
                })
            }
            // The action list above is closed.
            other => Err(LifecycleError::bad_request(format!("unknown action {other}"))),
        }
    }

    /// Applies a settings overlay to a live project.
    pub async fn specification(
        &self,
        project_id: &str,
        settings: ProjectSettings,
    ) -> Result<Accepted, LifecycleError> {
        if project_id.is_empty() {
            return Err(LifecycleError::bad_request("projectID is required"));
        }

        let meta = self.layout.metadata(project_id);
        let info = self
            .store
            .load(&meta.info_file, true)
            .await
            .ok_or_else(|| {
                LifecycleError::not_found(format!("project {project_id} does not exist"))
            })?;
        let handler = self.registry.handler_for(&info)?;

        let operation = Operation::new(OperationKind::Update, info.clone());
        let updated = merge_project_info(info.clone(), handler.as_ref(), &settings);
        self.store.save(&meta, &updated, true).await;

        // New watch lists only take effect through a fresh watcher.
        if updated.watched_files != info.watched_files
            || updated.ignored_files != info.ignored_files
        {
            self.watchers.stop(project_id, &updated.location).await;
            if let Err(e) = self.watchers.launch(&updated).await {
                error!("failed to restart watcher for {project_id}: {e}");
            }
        }

        Ok(Accepted {
            status_code: 202,
            operation_id: operation.operation_id,
            build_log_path: None,
            image_name: None,
        })
    }

    /// Current app and build log files as reported by the handler.
    pub async fn logs(&self, project_id: &str) -> Result<LogsResponse, LifecycleError> {
        if project_id.is_empty() {
            return Err(LifecycleError::bad_request("projectID is required"));
        }

        let meta = self.layout.metadata(project_id);
        let info = self
            .store
            .load(&meta.info_file, true)
            .await
            .ok_or_else(|| {
                LifecycleError::not_found(format!("project {project_id} does not exist"))
            })?;
        if tokio::fs::metadata(&info.location).await.is_err() {
            return Err(LifecycleError::not_found(format!(
                "location {} does not exist",
                info.location.display()
            )));
        }

        let handler = self.registry.handler_for(&info)?;
        let app = handler.log_files(&info, LogKind::App).await?;
        let build = handler.log_files(&info, LogKind::Build).await?;

        Ok(LogsResponse {
            status_code: 200,
            logs: LogBundle { app, build },
        })
    }

    /// Polls the handler for the project's log files of one stream and
    /// reports whether the list changed since the last poll.
    ///
    /// The poll retries with a fixed delay while the handler reports no
    /// files at all, up to a fixed budget. An unchanged list answers with
    /// no payload; a changed one updates the cache and notifies listeners.
    pub async fn check_new_log_file(
        &self,
        project_id: &str,
        kind: LogKind,
    ) -> Result<LogListResponse, LifecycleError> {
        if project_id.is_empty() {
            return Err(LifecycleError::bad_request("projectID is required"));
        }

        let meta = self.layout.metadata(project_id);
        let info = self
            .store
            .load(&meta.info_file, true)
            .await
            .ok_or_else(|| {
                LifecycleError::not_found(format!("project {project_id} does not exist"))
            })?;
        let handler = self.registry.handler_for(&info)?;

        let mut files = Vec::new();
        for attempt in 0..LOG_POLL_ATTEMPTS {
            files = handler.log_files(&info, kind).await?;
            if !files.is_empty() {
                break;
            }
            if attempt + 1 == LOG_POLL_ATTEMPTS {
                warn!("no log files reported for {project_id} after {LOG_POLL_ATTEMPTS} polls");
                return Err(LifecycleError::not_found(format!(
                    "no log files reported for {project_id}"
                )));
            }
            tokio::time::sleep(LOG_POLL_DELAY).await;
        }

        let changed = {
            let mut lists = self.log_lists.lock().await;
            let per_kind = lists.entry(project_id.to_string()).or_default();
            match per_kind.get(&kind) {
                Some(cached) if same_file_set(cached, &files) => false,
                _ => {
                    per_kind.insert(kind, files.clone());
                    true
                }
            }
        };

        if !changed {
            return Ok(LogListResponse {
                status_code: 200,
                logs: None,
            });
        }

        self.events.emit(Event::ProjectLogsListChanged {
            project_id: project_id.to_string(),
            kind,
            files: files.clone(),
        });
        Ok(LogListResponse {
            status_code: 200,
            logs: Some(files),
        })
    }

    /// Drops all scheduled work and stops every known project's watcher.
    pub async fn shutdown(&self) -> Result<u16, LifecycleError> {
        info!("shutting down: dropping pending and running builds");
        self.scheduler.shutdown().await;

        let ids: Vec<String> = self.projects.lock().await.iter().cloned().collect();
        for project_id in ids {
            let meta = self.layout.metadata(&project_id);
            if let Some(info) = self.store.load(&meta.info_file, true).await {
                self.watchers.stop(&project_id, &info.location).await;
            }
        }
        Ok(202)
    }
}

/// Reads `.cw-settings` at the project location. A missing or unparseable
/// file yields the empty overlay.
async fn read_settings(location: &Path) -> ProjectSettings {
    let path = location.join(".cw-settings");
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring unparseable {}: {e}", path.display());
                ProjectSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProjectSettings::default(),
        Err(e) => {
            warn!("failed to read {}: {e}", path.display());
            ProjectSettings::default()
        }
    }
}

/// Order-insensitive list equality (mutual subset).
fn same_file_set(a: &[PathBuf], b: &[PathBuf]) -> bool {
    a.iter().all(|f| b.contains(f)) && b.iter().all(|f| a.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sets_compare_ignoring_order() {
        let a = vec![PathBuf::from("a.log"), PathBuf::from("b.log")];
        let b = vec![PathBuf::from("b.log"), PathBuf::from("a.log")];
        assert!(same_file_set(&a, &b));
        assert!(same_file_set(&[], &[]));

        let c = vec![PathBuf::from("a.log")];
        assert!(!same_file_set(&a, &c));
        assert!(!same_file_set(&c, &a));
    }

    #[tokio::test]
    async fn missing_settings_file_is_the_empty_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let settings = read_settings(dir.path()).await;
        assert!(settings.internal_port.is_none());

        std::fs::write(dir.path().join(".cw-settings"), "{not json").unwrap();
        let settings = read_settings(dir.path()).await;
        assert!(settings.internal_port.is_none());

        std::fs::write(
            dir.path().join(".cw-settings"),
            r#"{"internalPort": 3000}"#,
        )
        .unwrap();
        let settings = read_settings(dir.path()).await;
        assert_eq!(settings.internal_port.unwrap().coerce(), "3000");
    }
}
