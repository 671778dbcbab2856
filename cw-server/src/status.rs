use async_trait::async_trait;
use cw_core::status::{BuildState, StatusController};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Last build transition recorded for a project.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSnapshot {
    pub state: BuildState,
    pub key: String,
    pub message: Option<String>,
}

/// In-memory status controller.
///
/// Tracks registered projects and their latest build transition. The portal
/// deployment substitutes its own [`StatusController`]; this table is what
/// the daemon and the tests run against.
#[derive(Default)]
pub struct StatusTable {
    projects: Mutex<HashMap<String, Option<BuildSnapshot>>>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, project_id: &str) -> Option<BuildSnapshot> {
        self.projects
            .lock()
            .await
            .get(project_id)
            .and_then(Clone::clone)
    }

    pub async fn is_registered(&self, project_id: &str) -> bool {
        self.projects.lock().await.contains_key(project_id)
    }
}

#[async_trait]
impl StatusController for StatusTable {
    async fn add_project(&self, project_id: &str) {
        self.projects
            .lock()
            .await
            .entry(project_id.to_string())
            .or_insert(None);
    }

    async fn delete_project(&self, project_id: &str) {
        self.projects.lock().await.remove(project_id);
    }

    async fn update_build_status(
        &self,
        project_id: &str,
        state: BuildState,
        key: &str,
        message: Option<String>,
    ) {
        let mut projects = self.projects.lock().await;
        match projects.get_mut(project_id) {
            Some(slot) => {
                debug!("build state of {project_id} -> {state:?} ({key})");
                *slot = Some(BuildSnapshot {
                    state,
                    key: key.to_string(),
                    message,
                });
            }
            None => warn!("build status update for unregistered project {project_id}"),
        }
    }

    async fn build_state(&self, project_id: &str) -> Option<BuildState> {
        self.projects
            .lock()
            .await
            .get(project_id)
            .and_then(|slot| slot.as_ref().map(|s| s.state))
    }
}
