use crate::project::ProjectInfo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of lifecycle action an [`Operation`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Create,
    Delete,
    Update,
    Validate,
    Build,
    EnableAutoBuild,
    DisableAutoBuild,
    ReconfigWatchedFiles,
}

/// One lifecycle action against a project.
///
/// Created at request admission, consumed by the handler, and referenced by
/// status and log emissions. Operations are never persisted.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_id: String,
    pub kind: OperationKind,
    pub project_info: ProjectInfo,
}

impl Operation {
    pub fn new(kind: OperationKind, project_info: ProjectInfo) -> Self {
        Self {
            operation_id: Uuid::new_v4().to_string(),
            kind,
            project_info,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_info.project_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_get_fresh_ids() {
        let info = ProjectInfo::new("p1", "docker", "/ws/p1");
        let a = Operation::new(OperationKind::Create, info.clone());
        let b = Operation::new(OperationKind::Create, info);
        assert_ne!(a.operation_id, b.operation_id);
        assert_eq!(a.project_id(), "p1");
    }
}
