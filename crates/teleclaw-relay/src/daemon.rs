//! Daemon lifecycle: PID-file lock, signal handling, graceful drain.
//!
//! A single relay instance owns the state directory. `daemon start` re-execs
//! this binary detached; `stop` signals the PID-file owner and waits for it
//! to drain. In-process shutdown lets the executing command finish inside a
//! 60 s grace window, then persists and exits — crash recovery is the
//! queue's executing→queued sweep at the next startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::watch;
use tracing::{info, warn};

use teleclaw_core::config::{COMMAND_MAX_AGE_HOURS, MAIL_POLL_INTERVAL_SECS, SHUTDOWN_GRACE_SECS};
use teleclaw_core::events::RelayEvent;
use teleclaw_core::fsutil::write_atomic;

use crate::app::RelayApp;
use crate::{controller, dispatch, monitor};

/// Interval of the janitor task (session GC + queue cleanup).
const JANITOR_INTERVAL: Duration = Duration::from_secs(3600);
/// Chat polls are local buffer drains; keep them snappy.
const CHAT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Exclusive-instance lock. The file holds the owner's PID; stale files
/// left by a crashed process are reclaimed.
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(pid) = read_pid(path) {
            if process_alive(pid) {
                bail!("another relay instance is running (pid {pid})");
            }
            warn!(pid, "reclaiming stale pid file");
        }
        write_atomic(path, std::process::id().to_string().as_bytes())
            .with_context(|| format!("writing pid file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn read_pid(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
pub fn process_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
pub fn process_alive(_pid: i32) -> bool {
    false
}

/// Run the relay in the foreground until a signal arrives.
pub async fn run(app: Arc<RelayApp>) -> anyhow::Result<()> {
    let _lock = PidLock::acquire(&app.pid_path())?;

    // Crash recovery: nothing survives a restart in `executing`.
    let recovered = app.queue.recover()?;
    if recovered > 0 {
        info!(count = recovered, "requeued interrupted commands");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Structured event log — the admin surface of last resort.
    spawn_event_logger(&app);

    if let Some(chat) = &app.chat {
        let cfg = chat.config().clone();
        let adapter = Arc::clone(chat);
        tokio::spawn(async move {
            if let Err(e) = teleclaw_chat::serve(adapter, &cfg.bind, cfg.port).await {
                warn!(error = %e, "chat webhook server exited");
            }
        });
    }

    let mut tasks = Vec::new();
    for transport in &app.inbound {
        let interval = match transport.name() {
            "chat" => CHAT_POLL_INTERVAL,
            _ => Duration::from_secs(
                app.config
                    .transports
                    .mail
                    .as_ref()
                    .map(|m| m.poll_interval_secs)
                    .unwrap_or(MAIL_POLL_INTERVAL_SECS),
            ),
        };
        tasks.push(tokio::spawn(controller::run_inbound_loop(
            Arc::clone(&app),
            Arc::clone(transport),
            interval,
            shutdown_rx.clone(),
        )));
    }
    tasks.push(tokio::spawn(dispatch::run_dispatch_loop(
        Arc::clone(&app),
        shutdown_rx.clone(),
    )));
    tasks.push(tokio::spawn(monitor::run_monitor_loop(
        Arc::clone(&app),
        shutdown_rx.clone(),
    )));
    tasks.push(tokio::spawn(run_janitor(
        Arc::clone(&app),
        shutdown_rx.clone(),
    )));

    app.events.emit(RelayEvent::Started);
    info!("relay started");

    wait_for_signal().await;
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    // Let the in-flight command finish, bounded by the grace window.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(SHUTDOWN_GRACE_SECS);
    while !app.in_flight.is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    if !app.in_flight.is_empty() {
        warn!(
            remaining = app.in_flight.len(),
            "grace window elapsed, abandoning in-flight commands"
        );
    }

    for task in tasks {
        task.abort();
    }
    app.events.emit(RelayEvent::Stopped);
    info!("relay stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn spawn_event_logger(app: &Arc<RelayApp>) {
    let mut rx = app.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!(target: "teleclaw::events", "{json}"),
                Err(e) => warn!(error = %e, "event serialization failed"),
            }
        }
    });
}

/// Hourly housekeeping: expired sessions and old terminal commands.
async fn run_janitor(app: Arc<RelayApp>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(JANITOR_INTERVAL) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            return;
        }
        let now = app.clock.now();
        let sessions = app.sessions.gc(now);
        let commands = app
            .queue
            .cleanup(chrono::Duration::hours(COMMAND_MAX_AGE_HOURS), now)
            .unwrap_or(0);
        if sessions > 0 || commands > 0 {
            info!(sessions, commands, "janitor pass");
        }
    }
}

/// Spawn `teleclaw relay start` as a detached background process.
#[cfg(unix)]
pub fn spawn_detached(config: Option<&str>, state_dir: &Path) -> anyhow::Result<u32> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().context("resolving own binary path")?;
    std::fs::create_dir_all(state_dir)?;
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(state_dir.join("daemon.log"))?;

    let mut cmd = std::process::Command::new(exe);
    cmd.arg("relay").arg("start");
    if let Some(path) = config {
        cmd.arg("--config").arg(path);
    }
    let child = cmd
        .stdin(std::process::Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log)
        .process_group(0)
        .spawn()
        .context("spawning daemon")?;

    Ok(child.id())
}

#[cfg(not(unix))]
pub fn spawn_detached(_config: Option<&str>, _state_dir: &Path) -> anyhow::Result<u32> {
    bail!("daemon mode requires a unix host")
}

#[cfg(not(unix))]
pub async fn stop(_pid_path: &Path, _grace: Duration) -> anyhow::Result<bool> {
    bail!("daemon mode requires a unix host")
}

/// Signal the PID-file owner and wait for it to exit.
#[cfg(unix)]
pub async fn stop(pid_path: &Path, grace: Duration) -> anyhow::Result<bool> {
    let Some(pid) = read_pid(pid_path) else {
        return Ok(false);
    };
    if !process_alive(pid) {
        let _ = std::fs::remove_file(pid_path);
        return Ok(false);
    }

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid),
        nix::sys::signal::Signal::SIGTERM,
    )
    .context("sending SIGTERM")?;

    let deadline = tokio::time::Instant::now() + grace;
    while process_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            bail!("daemon (pid {pid}) did not exit within {}s", grace.as_secs());
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    Ok(true)
}
