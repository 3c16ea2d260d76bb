//! The dispatch loop — pulls ready commands and drives the delivery backend.
//!
//! Every tick pulls all ready commands (at most one per session), flips each
//! to `executing`, and runs the delivery concurrently per session. A hard
//! wall-clock deadline bounds each injection; failures feed the queue's
//! retry machinery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, warn};

use teleclaw_core::events::RelayEvent;
use teleclaw_queue::QueuedCommand;

use crate::app::RelayApp;

/// Wall-clock cap per injection: 8 confirmation passes at 1.5 s plus the
/// typing pauses, consent settles, and unknown-tail waits.
const INJECTION_DEADLINE: Duration = Duration::from_secs(45);

pub async fn run_dispatch_loop(app: Arc<RelayApp>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(app.config.relay.dispatch_interval_secs);
    info!(interval_secs = interval.as_secs(), "dispatch loop started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            info!("dispatch loop stopped");
            return;
        }

        let _running = dispatch_once(&app);
    }
}

/// One dispatcher tick: pull everything ready and start executions. Returns
/// the spawned execution handles so callers that need determinism (tests,
/// shutdown drains) can await them; the loop just drops them.
pub fn dispatch_once(app: &Arc<RelayApp>) -> Vec<tokio::task::JoinHandle<()>> {
    let now = app.clock.now();
    let mut handles = Vec::new();
    for cmd in app.queue.dequeue_ready(now) {
        // The queue excludes sessions with a persisted executing entry; the
        // in-flight map additionally guards the window between this tick and
        // the spawned task's completion.
        if app.in_flight.contains_key(&cmd.session_id) {
            continue;
        }
        if let Err(e) = app.queue.mark_executing(&cmd.id, now) {
            error!(queue_id = %cmd.id, error = %e, "mark executing failed");
            continue;
        }
        app.in_flight.insert(cmd.session_id.clone(), cmd.id.clone());
        handles.push(tokio::spawn(execute_one(Arc::clone(app), cmd)));
    }
    handles
}

/// Run a single command through the delivery backend and settle its status.
async fn execute_one(app: Arc<RelayApp>, cmd: QueuedCommand) {
    let result = deliver(&app, &cmd).await;
    let now = app.clock.now();

    match result {
        Ok(()) => {
            if let Err(e) = app.queue.mark_completed(&cmd.id, now) {
                error!(queue_id = %cmd.id, error = %e, "mark completed failed");
            }
            info!(queue_id = %cmd.id, session_id = %cmd.session_id, "command executed");
            app.events.emit(RelayEvent::CommandExecuted {
                queue_id: cmd.id.clone(),
                session_id: cmd.session_id.clone(),
            });
        }
        Err(message) => {
            let will_retry = match app.queue.mark_failed(&cmd.id, &message, now) {
                Ok(retry) => retry,
                Err(e) => {
                    error!(queue_id = %cmd.id, error = %e, "mark failed failed");
                    false
                }
            };
            warn!(
                queue_id = %cmd.id,
                session_id = %cmd.session_id,
                will_retry,
                error = %message,
                "command failed"
            );
            app.events.emit(RelayEvent::CommandFailed {
                queue_id: cmd.id.clone(),
                session_id: cmd.session_id.clone(),
                error: message,
                will_retry,
            });
        }
    }

    app.in_flight.remove(&cmd.session_id);
}

async fn deliver(app: &RelayApp, cmd: &QueuedCommand) -> Result<(), String> {
    // The session may have expired between enqueue and dispatch; its pane
    // name is still needed to deliver, so a vanished session is terminal.
    let Some(session) = app.sessions.get(&cmd.session_id) else {
        return Err(format!("session {} no longer exists", cmd.session_id));
    };

    match timeout(
        INJECTION_DEADLINE,
        app.backend.deliver(&session.pane, &cmd.command),
    )
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_elapsed) => Err(format!(
            "injection timeout after {}s",
            INJECTION_DEADLINE.as_secs()
        )),
    }
}
