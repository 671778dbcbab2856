use crate::layout::WorkspaceLayout;
use anyhow::Result;
use cw_core::project::ProjectInfo;
use cw_utils::process::{cmd_strings, find_pids_matching, kill_pid, kill_pids, spawn_detached};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Starts and stops the per-project file-watcher child processes.
///
/// One long-lived watcher runs per project. PIDs we spawned are tracked and
/// killed directly; the process-table scan covers watchers left behind by a
/// previous daemon run. Under a cluster manager the supervisor is a no-op
/// apart from its book-keeping.
pub struct WatcherSupervisor {
    script: PathBuf,
    workspace: PathBuf,
    portal_port: u16,
    cluster_managed: bool,
    tracked: Mutex<HashMap<String, u32>>,
}

impl WatcherSupervisor {
    pub fn new(layout: &WorkspaceLayout, portal_port: u16, cluster_managed: bool) -> Self {
        Self {
            script: layout.watcher_script.clone(),
            workspace: layout.workspace.clone(),
            portal_port,
            cluster_managed,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Kills any stale watcher for the project's location, then spawns a
    /// fresh one.
    pub async fn launch(&self, info: &ProjectInfo) -> Result<()> {
        if self.cluster_managed {
            return Ok(());
        }

        self.reap_stale(&info.location).await;

        let args = watcher_args(info, &self.workspace, self.portal_port);
        let label = format!("project-watcher {}", info.project_id);
        let pid = spawn_detached(&self.script, &args, &label).await?;
        info!("started watcher for {} (pid {pid})", info.project_id);
        self.tracked.lock().await.insert(info.project_id.clone(), pid);
        Ok(())
    }

    /// Stops the project's watcher. In cluster mode only the in-memory
    /// entry is dropped.
    pub async fn stop(&self, project_id: &str, location: &Path) {
        let tracked = self.tracked.lock().await.remove(project_id);
        if self.cluster_managed {
            return;
        }

        if let Some(pid) = tracked {
            if let Err(e) = kill_pid(pid as i32) {
                warn!("failed to stop watcher for {project_id}: {e}");
            }
        }
        self.reap_stale(location).await;
    }

    /// Scans the process table for watchers referencing this exact
    /// location and kills them. Kill failures are logged, never raised.
    async fn reap_stale(&self, location: &Path) {
        let script = self.script.to_string_lossy().into_owned();
        let location = location.to_string_lossy().into_owned();

        let pids =
            find_pids_matching(|proc| is_project_watcher(&cmd_strings(proc), &script, &location));
        if pids.is_empty() {
            return;
        }

        info!("reaping {} stale watcher process(es) for {location}", pids.len());
        kill_pids(&pids).await;
    }
}

/// Matches watcher processes for exactly this location. The trailing space
/// (script form) and trailing slash (inotify form) keep a project from
/// matching another project whose location shares its prefix.
fn is_project_watcher(cmd: &[String], script: &str, location: &str) -> bool {
    let joined = cmd.join(" ");
    if joined.contains(&format!("{script} {location} ")) {
        return true;
    }

    let marker = format!("{location}/");
    cmd.first().is_some_and(|c| c.contains("inotifywait"))
        && cmd.iter().any(|arg| arg.contains(&marker))
}

/// Argument vector handed to the project-watcher script. Unset slots are
/// empty strings.
fn watcher_args(info: &ProjectInfo, workspace: &Path, portal_port: u16) -> Vec<String> {
    let watched = match &info.watched_files {
        Some(files) => files.join(","),
        // A container project with no explicit watch list watches everything.
        None if info.project_type == "docker" => format!("{}/", info.location.display()),
        None => String::new(),
    };
    let ignored = info
        .ignored_files
        .as_ref()
        .map(|files| files.join(","))
        .unwrap_or_default();

    vec![
        info.location.display().to_string(),
        workspace.display().to_string(),
        info.project_id.clone(),
        "localhost".to_string(),
        watched,
        ignored,
        String::new(),
        portal_port.to_string(),
    ]
}
