use crate::handler::LogKind;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome reported by the asynchronous deletion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletionStatus {
    Success,
    Failed,
}

/// Events pushed to the portal through the socket event bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    NewProjectAdded {
        #[serde(rename = "projectID")]
        project_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ignored_paths: Option<Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    ProjectDeletion {
        operation_id: String,
        #[serde(rename = "projectID")]
        project_id: String,
        status: DeletionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ProjectLogsListChanged {
        #[serde(rename = "projectID")]
        project_id: String,
        #[serde(rename = "type")]
        kind: LogKind,
        files: Vec<PathBuf>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewProjectAdded { .. } => "newProjectAdded",
            Self::ProjectDeletion { .. } => "projectDeletion",
            Self::ProjectLogsListChanged { .. } => "projectLogsListChanged",
        }
    }
}

/// Fire-and-forget delivery to whatever is listening on the other side.
pub trait EventBus: Send + Sync {
    fn emit(&self, event: Event);
}
