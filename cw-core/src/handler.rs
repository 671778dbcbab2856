use crate::error::LifecycleError;
use crate::operation::Operation;
use crate::project::{ProjectInfo, StartMode};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Which of a project's log streams is being queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogKind {
    App,
    Build,
}

/// Launch modes a handler supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCapabilities {
    pub start_modes: Vec<StartMode>,
}

impl Default for ProjectCapabilities {
    fn default() -> Self {
        Self {
            start_modes: vec![StartMode::Run],
        }
    }
}

impl ProjectCapabilities {
    pub fn supports(&self, mode: StartMode) -> bool {
        self.start_modes.contains(&mode)
    }
}

/// Per-project-type plug-in that builds, deletes and inspects projects.
///
/// `create` detaches: it returns once the build is underway and the handler
/// reports a terminal state through the status controller later. The daemon
/// learns about completion by polling during reconciliation.
#[async_trait]
pub trait Handler: Send + Sync {
    fn supported_type(&self) -> &str;

    async fn create(&self, operation: &Operation) -> Result<()>;

    async fn delete_container(&self, info: &ProjectInfo) -> Result<()>;

    /// Files that must exist under the project location before a build may
    /// start, relative to the location.
    fn required_files(&self) -> Vec<String> {
        Vec::new()
    }

    /// Default application ports, applied when `.cw-settings` carries no
    /// `internalPort`.
    fn default_app_ports(&self) -> Vec<String> {
        Vec::new()
    }

    fn default_debug_port(&self) -> Option<String> {
        None
    }

    fn default_ignored_paths(&self) -> Vec<String> {
        Vec::new()
    }

    fn capabilities(&self) -> ProjectCapabilities {
        ProjectCapabilities::default()
    }

    /// Log files the handler currently reports for the given stream.
    async fn log_files(&self, _info: &ProjectInfo, _kind: LogKind) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Resolves a project type to its handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        self.handlers
            .insert(handler.supported_type().to_string(), handler);
    }

    pub fn project_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn handler_for_type(&self, project_type: &str) -> Result<Arc<dyn Handler>, LifecycleError> {
        self.handlers.get(project_type).cloned().ok_or_else(|| {
            LifecycleError::not_found(format!("no handler for project type {project_type}"))
        })
    }

    pub fn handler_for(&self, info: &ProjectInfo) -> Result<Arc<dyn Handler>, LifecycleError> {
        self.handler_for_type(&info.project_type)
    }
}
