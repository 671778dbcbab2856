use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Stdio;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tracing::{debug, warn};

/// Command line of a process as plain strings.
pub fn cmd_strings(proc: &sysinfo::Process) -> Vec<String> {
    proc.cmd()
        .iter()
        .map(|s| s.to_string_lossy().into_owned())
        .collect()
}

/// Scans the process table and returns the PIDs matching the predicate.
pub fn find_pids_matching<F>(mut predicate: F) -> Vec<Pid>
where
    F: FnMut(&sysinfo::Process) -> bool,
{
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    system
        .processes()
        .iter()
        .filter_map(|(pid, proc)| if predicate(proc) { Some(*pid) } else { None })
        .collect()
}

/// Terminates the given PIDs: TERM first, then KILL for survivors.
///
/// Per-PID failures are logged and swallowed; a process that is already
/// gone is not a failure.
pub async fn kill_pids(pids: &[Pid]) {
    if pids.is_empty() {
        return;
    }

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    for pid in pids {
        if let Some(proc) = system.process(*pid) {
            if proc.kill_with(Signal::Term).is_none() {
                warn!("TERM not deliverable to pid {pid}");
            }
        }
    }

    // Give TERM some time, then KILL remaining.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    system.refresh_processes(ProcessesToUpdate::All, true);
    for pid in pids {
        if let Some(proc) = system.process(*pid) {
            if !proc.kill() {
                warn!("failed to kill pid {pid}");
            }
        }
    }
}

/// Sends TERM to a single tracked PID. A process that already exited is
/// treated as success.
pub fn kill_pid(pid: i32) -> Result<()> {
    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid as NixPid;

    match kill(NixPid::from_raw(pid), NixSignal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(anyhow!("failed to signal pid {pid}: {e}")),
    }
}

/// Spawns a long-lived child in its own process group with all stdio
/// detached, and reaps it in the background. Returns the child's PID.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned or exits before a PID
/// can be observed.
pub async fn spawn_detached(program: &Path, args: &[String], label: &str) -> Result<u32> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {}", program.display()))?;
    let pid = child
        .id()
        .ok_or_else(|| anyhow!("{label} exited before a pid was observed"))?;

    let label = label.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("{label} (pid {pid}) exited with {status}"),
            Err(e) => warn!("failed to reap {label} (pid {pid}): {e}"),
        }
    });

    Ok(pid)
}
