use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Build state of a project as tracked by the status controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildState {
    Queued,
    InProgress,
    Success,
    Failed,
}

impl BuildState {
    /// A terminal state means the scheduler may reap the entry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Contract of the external status controller.
///
/// The daemon registers projects here, pushes build-state transitions with a
/// message key (and an optional localised message), and polls the current
/// build state during reconciliation. Implementations may suspend; callers
/// never hold scheduler locks across these calls.
#[async_trait]
pub trait StatusController: Send + Sync {
    async fn add_project(&self, project_id: &str);

    async fn delete_project(&self, project_id: &str);

    async fn update_build_status(
        &self,
        project_id: &str,
        state: BuildState,
        key: &str,
        message: Option<String>,
    );

    /// Current build state, or `None` for an unregistered project.
    async fn build_state(&self, project_id: &str) -> Option<BuildState>;
}
