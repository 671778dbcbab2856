use anyhow::{Context, Result};
use cw_core::handler::HandlerRegistry;
use cw_core::locale::EnglishCatalog;
use cw_server::bus::BroadcastBus;
use cw_server::ipc;
use cw_server::layout::WorkspaceLayout;
use cw_server::lifecycle::Lifecycle;
use cw_server::scheduler::BuildScheduler;
use cw_server::status::StatusTable;
use cw_server::store::InfoStore;
use cw_server::watcher::WatcherSupervisor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("cw-server starting...");

    let workspace = match std::env::var("CW_WORKSPACE") {
        Ok(path) => PathBuf::from(path),
        Err(_) => std::env::current_dir().context("could not determine the workspace root")?,
    };
    let layout = WorkspaceLayout::discover(workspace)?;

    let registry = Arc::new(HandlerRegistry::new());
    if registry.project_types().is_empty() {
        warn!("no project-type handlers registered; create requests will be rejected");
    }

    let status = Arc::new(StatusTable::new());
    let events = Arc::new(BroadcastBus::new());
    let translator = Arc::new(EnglishCatalog);
    let watchers = Arc::new(WatcherSupervisor::new(
        &layout,
        cw_utils::env::portal_port(),
        cw_utils::env::in_k8(),
    ));

    let max_builds = cw_utils::env::max_builds();
    info!("build concurrency cap: {max_builds}");
    let (scheduler, tick_rx) = BuildScheduler::new(
        max_builds,
        status.clone(),
        events.clone(),
        watchers.clone(),
        translator.clone(),
    );
    let scheduler = Arc::new(scheduler);
    tokio::spawn(scheduler.clone().run(tick_rx));

    let lifecycle = Lifecycle::new(
        layout,
        Arc::new(InfoStore::new()),
        registry,
        status,
        scheduler,
        watchers,
        events,
        translator,
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel(1);
    let lifecycle_ipc = lifecycle.clone();
    tokio::spawn(async move {
        if let Err(e) = ipc::run_ipc_server(lifecycle_ipc, shutdown_tx).await {
            warn!("IPC server error: {e}");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
        _ = shutdown_rx.recv() => info!("received shutdown request"),
    }

    if let Err(e) = lifecycle.shutdown().await {
        warn!("error during shutdown: {e}");
    }

    let _ = std::fs::remove_file(ipc::SOCKET_PATH);

    info!("cw-server stopped");
    Ok(())
}
