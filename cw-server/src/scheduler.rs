use crate::watcher::WatcherSupervisor;
use cw_core::event::{Event, EventBus};
use cw_core::handler::Handler;
use cw_core::locale::{keys, LocaleTranslator};
use cw_core::operation::Operation;
use cw_core::status::{BuildState, StatusController};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// Period of the reconciliation tick.
const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// A pending or in-flight build: the admitted operation plus the handler
/// that will run it.
#[derive(Clone)]
pub struct BuildQueueEntry {
    pub operation: Operation,
    pub handler: Arc<dyn Handler>,
}

impl BuildQueueEntry {
    pub fn project_id(&self) -> &str {
        self.operation.project_id()
    }
}

#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<BuildQueueEntry>,
    running: Vec<BuildQueueEntry>,
}

impl SchedulerState {
    fn contains(&self, project_id: &str) -> bool {
        self.queue.iter().any(|e| e.project_id() == project_id)
            || self.running.iter().any(|e| e.project_id() == project_id)
    }
}

/// Which collections a project was removed from.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueRemoval {
    pub from_queue: bool,
    pub from_running: bool,
}

/// Bounded build scheduler.
///
/// Builds wait in a FIFO queue and at most `max_builds` run at once. A
/// five-second tick (or an explicit tick request) reaps finished builds,
/// admits queued ones, and re-broadcasts queue ranks. Handler calls and
/// status updates happen outside the state lock.
pub struct BuildScheduler {
    state: Mutex<SchedulerState>,
    max_builds: usize,
    status: Arc<dyn StatusController>,
    events: Arc<dyn EventBus>,
    watchers: Arc<WatcherSupervisor>,
    translator: Arc<dyn LocaleTranslator>,
    tick_tx: mpsc::Sender<()>,
}

impl BuildScheduler {
    /// Returns the scheduler and the receiver end of its tick channel; pass
    /// the receiver to [`BuildScheduler::run`].
    pub fn new(
        max_builds: usize,
        status: Arc<dyn StatusController>,
        events: Arc<dyn EventBus>,
        watchers: Arc<WatcherSupervisor>,
        translator: Arc<dyn LocaleTranslator>,
    ) -> (Self, mpsc::Receiver<()>) {
        // Capacity 1: a tick requested while one is pending coalesces into it.
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let scheduler = Self {
            state: Mutex::new(SchedulerState::default()),
            max_builds,
            status,
            events,
            watchers,
            translator,
            tick_tx,
        };
        (scheduler, tick_rx)
    }

    /// Drives reconciliation until the tick channel closes.
    pub async fn run(self: Arc<Self>, mut tick_rx: mpsc::Receiver<()>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                request = tick_rx.recv() => {
                    if request.is_none() {
                        return;
                    }
                }
            }
            self.reconcile().await;
        }
    }

    /// Requests an out-of-band reconciliation tick.
    pub fn request_tick(&self) {
        let _ = self.tick_tx.try_send(());
    }

    /// Adds an entry to the queue unless the project is already queued or
    /// building. Returns whether the entry was added.
    pub async fn enqueue(&self, entry: BuildQueueEntry) -> bool {
        let mut state = self.state.lock().await;
        if state.contains(entry.project_id()) {
            debug!("{} already queued or building", entry.project_id());
            return false;
        }
        state.queue.push_back(entry);
        true
    }

    /// Removes the project from the queue and the running set. The caller
    /// re-broadcasts ranks when `from_queue` is set.
    pub async fn remove(&self, project_id: &str) -> QueueRemoval {
        let mut state = self.state.lock().await;

        let queued_before = state.queue.len();
        state.queue.retain(|e| e.project_id() != project_id);
        let removed_from_queue = queued_before - state.queue.len();
        // Idempotent enqueue guarantees a project occupies one slot at most.
        debug_assert!(removed_from_queue <= 1);

        let running_before = state.running.len();
        state.running.retain(|e| e.project_id() != project_id);

        QueueRemoval {
            from_queue: removed_from_queue > 0,
            from_running: running_before != state.running.len(),
        }
    }

    /// One reconciliation pass: reap finished builds, admit queued builds
    /// up to the cap, re-broadcast ranks when the queue changed.
    pub async fn reconcile(&self) {
        // Reap. Build states are polled outside the state lock.
        let running_ids: Vec<String> = {
            let state = self.state.lock().await;
            state.running.iter().map(|e| e.project_id().to_string()).collect()
        };
        let mut finished = Vec::new();
        for project_id in running_ids {
            if let Some(state) = self.status.build_state(&project_id).await {
                if state.is_terminal() {
                    finished.push((project_id, state));
                }
            }
        }

        // Admit.
        let mut queue_changed = false;
        let to_start = {
            let mut state = self.state.lock().await;
            for (project_id, build_state) in &finished {
                state.running.retain(|e| e.project_id() != project_id.as_str());
                info!("build of {project_id} finished ({build_state:?})");
            }

            let mut to_start = Vec::new();
            while !state.queue.is_empty() && state.running.len() < self.max_builds {
                // Entries enter the running set before their handler is
                // invoked, so the cap holds for any outside observer.
                if let Some(entry) = state.queue.pop_front() {
                    queue_changed = true;
                    state.running.push(entry.clone());
                    to_start.push(entry);
                }
            }
            debug_assert!(state.running.len() <= self.max_builds);
            to_start
        };

        for entry in &to_start {
            self.trigger_build(entry).await;
        }

        if queue_changed {
            self.emit_ranks().await;
        }
    }

    /// Starts one admitted build: validates required files, flips the build
    /// state, detaches the handler, starts the watcher and announces the
    /// project.
    async fn trigger_build(&self, entry: &BuildQueueEntry) {
        let info = &entry.operation.project_info;
        let project_id = info.project_id.clone();

        let required = entry.handler.required_files();
        if let Some(missing) = missing_required_file(&info.location, &required) {
            // The entry stays in the running set; the failed state makes the
            // next reap pass collect it.
            error!("cannot build {project_id}: {missing} is missing");
            let message = self
                .translator
                .translation(keys::BUILD_FAIL_MISSING_FILE, &[("file", &missing)]);
            self.status
                .update_build_status(
                    &project_id,
                    BuildState::Failed,
                    keys::BUILD_FAIL_MISSING_FILE,
                    Some(message),
                )
                .await;
            return;
        }

        let message = self.translator.translation(keys::BUILD_STARTED, &[]);
        self.status
            .update_build_status(
                &project_id,
                BuildState::InProgress,
                keys::BUILD_STARTED,
                Some(message),
            )
            .await;

        // The handler detaches; completion is observed through the status
        // controller on a later tick.
        let handler = entry.handler.clone();
        let operation = entry.operation.clone();
        let status = self.status.clone();
        let translator = self.translator.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.create(&operation).await {
                let project_id = operation.project_id();
                error!("handler failed to start build of {project_id}: {e}");
                let message =
                    translator.translation(keys::BUILD_FAILED, &[("error", &e.to_string())]);
                status
                    .update_build_status(
                        project_id,
                        BuildState::Failed,
                        keys::BUILD_FAILED,
                        Some(message),
                    )
                    .await;
            }
        });

        if let Err(e) = self.watchers.launch(info).await {
            error!("failed to start watcher for {project_id}: {e}");
        }

        self.events.emit(Event::NewProjectAdded {
            project_id,
            ignored_paths: info.ignored_paths.clone(),
        });
    }

    /// Pushes a fresh `queued` status with rank `i+1/N` to every queued
    /// project.
    pub async fn emit_ranks(&self) {
        let queued: Vec<String> = {
            let state = self.state.lock().await;
            state.queue.iter().map(|e| e.project_id().to_string()).collect()
        };

        let total = queued.len();
        for (index, project_id) in queued.iter().enumerate() {
            let rank = format!("{}/{}", index + 1, total);
            let message = self
                .translator
                .translation(keys::BUILD_RANK, &[("rank", &rank)]);
            self.status
                .update_build_status(project_id, BuildState::Queued, keys::BUILD_RANK, Some(message))
                .await;
        }
    }

    /// Drops all pending and in-flight entries, keeping the allocations.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.queue.clear();
        state.running.clear();
    }

    pub async fn queued_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.queue.iter().map(|e| e.project_id().to_string()).collect()
    }

    pub async fn running_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.running.iter().map(|e| e.project_id().to_string()).collect()
    }
}

/// First required file missing under the location, if any.
pub(crate) fn missing_required_file(location: &Path, required: &[String]) -> Option<String> {
    required
        .iter()
        .find(|file| !location.join(file.trim_start_matches('/')).exists())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_required_file_reports_the_first_gap() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch").unwrap();

        let required = vec!["Dockerfile".to_string(), "entrypoint.sh".to_string()];
        assert_eq!(
            missing_required_file(dir.path(), &required),
            Some("entrypoint.sh".to_string())
        );

        std::fs::write(dir.path().join("entrypoint.sh"), "").unwrap();
        assert_eq!(missing_required_file(dir.path(), &required), None);

        // Leading slashes are interpreted relative to the location.
        assert_eq!(
            missing_required_file(dir.path(), &["/Dockerfile".to_string()]),
            None
        );
    }
}
