use cw_core::project::{ProjectInfo, ProjectMetadata, StartMode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, warn};

/// A single typed change applied through [`InfoStore::update`].
#[derive(Debug, Clone)]
pub enum InfoUpdate {
    /// Replaces the single app-port slot.
    AppPort(String),
    AutoBuild(bool),
    StartMode(StartMode),
    WatchedFiles(Vec<String>),
}

/// Write-through cache over the per-project JSON documents.
///
/// The cache is authoritative: a failed disk write is logged and the cached
/// record stands; a failed disk read is treated as "not found".
#[derive(Default)]
pub struct InfoStore {
    cache: Mutex<HashMap<PathBuf, ProjectInfo>>,
}

impl InfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, meta: &ProjectMetadata, info: &ProjectInfo, persist: bool) {
        self.cache
            .lock()
            .await
            .insert(meta.info_file.clone(), info.clone());

        if !persist {
            return;
        }
        match serde_json::to_string_pretty(info) {
            Ok(content) => {
                if let Err(e) = tokio::fs::write(&meta.info_file, content).await {
                    error!("failed to persist {}: {e}", meta.info_file.display());
                }
            }
            Err(e) => error!("failed to serialize {}: {e}", meta.info_file.display()),
        }
    }

    pub async fn load(&self, info_file: &Path, quiet: bool) -> Option<ProjectInfo> {
        if let Some(hit) = self.cache.lock().await.get(info_file) {
            return Some(hit.clone());
        }

        let content = match tokio::fs::read_to_string(info_file).await {
            Ok(content) => content,
            Err(e) => {
                if !quiet {
                    warn!("failed to read {}: {e}", info_file.display());
                }
                return None;
            }
        };
        match serde_json::from_str::<ProjectInfo>(&content) {
            Ok(info) => {
                self.cache
                    .lock()
                    .await
                    .insert(info_file.to_path_buf(), info.clone());
                Some(info)
            }
            Err(e) => {
                if !quiet {
                    warn!("failed to parse {}: {e}", info_file.display());
                }
                None
            }
        }
    }

    /// Applies one typed change and writes the record back. Returns the
    /// updated record, or `None` when the project is unknown.
    pub async fn update(&self, meta: &ProjectMetadata, change: InfoUpdate) -> Option<ProjectInfo> {
        let mut info = self.load(&meta.info_file, false).await?;
        match change {
            InfoUpdate::AppPort(port) => info.set_app_port(port),
            InfoUpdate::AutoBuild(enabled) => info.auto_build_enabled = enabled,
            InfoUpdate::StartMode(mode) => info.start_mode = mode,
            InfoUpdate::WatchedFiles(files) => info.watched_files = Some(files),
        }
        self.save(meta, &info, true).await;
        Some(info)
    }

    pub async fn evict(&self, info_file: &Path) {
        self.cache.lock().await.remove(info_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn meta_in(dir: &Path) -> ProjectMetadata {
        ProjectMetadata::new("p1", dir, &dir.join("logs"))
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let meta = meta_in(dir.path());
        std::fs::create_dir_all(&meta.dir).unwrap();

        let mut info = ProjectInfo::new("p1", "docker", "/ws/p1");
        info.set_app_port("8080");

        let store = InfoStore::new();
        store.save(&meta, &info, true).await;
        assert_eq!(store.load(&meta.info_file, false).await, Some(info.clone()));

        // A fresh store reads the persisted document.
        let fresh = InfoStore::new();
        assert_eq!(fresh.load(&meta.info_file, false).await, Some(info));
    }

    #[tokio::test]
    async fn load_of_missing_file_is_absent() {
        let dir = tempdir().unwrap();
        let store = InfoStore::new();
        assert!(store
            .load(&dir.path().join("nope.json"), true)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn app_port_update_replaces_the_slot() {
        let dir = tempdir().unwrap();
        let meta = meta_in(dir.path());
        std::fs::create_dir_all(&meta.dir).unwrap();

        let mut info = ProjectInfo::new("p1", "docker", "/ws/p1");
        info.set_app_port("8080");
        let store = InfoStore::new();
        store.save(&meta, &info, true).await;

        let updated = store
            .update(&meta, InfoUpdate::AppPort("3000".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.app_ports, vec!["3000".to_string()]);
        assert_eq!(
            store.load(&meta.info_file, false).await.unwrap().app_ports,
            vec!["3000".to_string()]
        );
    }

    #[tokio::test]
    async fn evict_drops_the_cache_entry() {
        let dir = tempdir().unwrap();
        let meta = meta_in(dir.path());
        std::fs::create_dir_all(&meta.dir).unwrap();

        let info = ProjectInfo::new("p1", "docker", "/ws/p1");
        let store = InfoStore::new();
        // Cache-only entry: nothing on disk, so after evict it is gone.
        store.save(&meta, &info, false).await;
        assert!(store.load(&meta.info_file, true).await.is_some());

        store.evict(&meta.info_file).await;
        assert!(store.load(&meta.info_file, true).await.is_none());
    }
}
