//! The pane monitor — the outbound half of the relay.
//!
//! Periodically captures each watched pane and classifies the tail. When a
//! pane transitions from busy to idle, the monitor mints a session token,
//! persists the record, and sends the notification through the pane's
//! configured transport. Debounced per pane: one completion, one
//! notification, until the pane goes busy again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use teleclaw_core::config::MonitoredPane;
use teleclaw_core::events::RelayEvent;
use teleclaw_core::ids::session_id;
use teleclaw_injector::{classify, PromptClass};
use teleclaw_mail::template::render_notification;
use teleclaw_sessions::SessionRecord;

use crate::app::RelayApp;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PaneState {
    /// The assistant is (or was last seen) doing something.
    Busy,
    /// Idle and already announced; wait for the next busy phase.
    Notified,
}

pub async fn run_monitor_loop(app: Arc<RelayApp>, mut shutdown: watch::Receiver<bool>) {
    let Some(driver) = app.driver.clone() else {
        info!("no pane driver (drop-folder mode), monitor disabled");
        return;
    };
    if app.config.monitor.panes.is_empty() {
        info!("no monitored panes configured");
        return;
    }

    let interval = Duration::from_secs(app.config.monitor.interval_secs);
    info!(
        panes = app.config.monitor.panes.len(),
        interval_secs = interval.as_secs(),
        "pane monitor started"
    );

    // Panes idle at startup are treated as already announced — the relay
    // notifies on completions it observed, not on whatever it finds first.
    let mut states: HashMap<String, PaneState> = app
        .config
        .monitor
        .panes
        .iter()
        .map(|p| (p.pane.clone(), PaneState::Notified))
        .collect();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            info!("pane monitor stopped");
            return;
        }

        for pane_cfg in &app.config.monitor.panes {
            let exists = match driver.has_session(&pane_cfg.pane).await {
                Ok(v) => v,
                Err(e) => {
                    debug!(pane = %pane_cfg.pane, error = %e, "existence probe failed");
                    continue;
                }
            };
            if !exists {
                continue;
            }

            let tail = match driver
                .capture(&pane_cfg.pane, app.config.injector.capture_lines)
                .await
            {
                Ok(t) => t,
                Err(e) => {
                    debug!(pane = %pane_cfg.pane, error = %e, "capture failed");
                    continue;
                }
            };

            let state = states
                .entry(pane_cfg.pane.clone())
                .or_insert(PaneState::Notified);
            match classify(&tail) {
                PromptClass::Idle => {
                    if *state == PaneState::Busy {
                        if notify_idle(&app, pane_cfg).await {
                            *state = PaneState::Notified;
                        }
                    }
                }
                _ => *state = PaneState::Busy,
            }
        }
    }
}

/// Mint a token, persist the session, and send the notification.
/// Returns `true` on success so the caller can debounce.
async fn notify_idle(app: &RelayApp, pane_cfg: &MonitoredPane) -> bool {
    let transport_name = pane_cfg.transport.to_string();
    let Some(outbound) = app.outbound.get(&transport_name) else {
        warn!(pane = %pane_cfg.pane, transport = %transport_name, "no outbound transport for pane");
        return false;
    };

    let now = app.clock.now();
    // Scoped so the thread-local RNG is gone before the first await.
    let minted = {
        let mut rng = rand::rng();
        app.sessions.mint_unique_token(&mut rng, now)
    };
    let token = match minted {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "token minting failed");
            return false;
        }
    };

    let record = SessionRecord::new(
        session_id(),
        token.clone(),
        pane_cfg.transport,
        pane_cfg.recipient.clone(),
        pane_cfg.pane.clone(),
        pane_cfg.project.clone(),
        now,
        app.config.relay.session_ttl_hours,
    );
    let id = match app.sessions.create(record, now) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "session create failed");
            return false;
        }
    };

    let payload = render_notification(
        &app.config.relay.product,
        &token,
        &id,
        &pane_cfg.project,
        &pane_cfg.pane,
        "The assistant is idle and waiting for input.",
    );

    match outbound.send(&pane_cfg.recipient, &payload).await {
        Ok(message_ref) => {
            if let Err(e) = app.sessions.attach_notification(&id, payload) {
                warn!(session_id = %id, error = %e, "notification audit copy failed");
            }
            info!(
                session_id = %id,
                token = %token,
                message_ref = %message_ref,
                "idle notification sent"
            );
            app.events.emit(RelayEvent::NotificationSent {
                session_id: id,
                token,
                transport: transport_name,
            });
            true
        }
        Err(e) => {
            // Roll the session back so the token is not burned on a
            // notification nobody received.
            warn!(session_id = %id, error = %e, "notification send failed");
            let _ = app.sessions.delete(&id);
            false
        }
    }
}
