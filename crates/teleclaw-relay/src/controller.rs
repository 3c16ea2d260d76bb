//! The relay controller — inbound poll loops and reply handling.
//!
//! One task per enabled inbound transport. Each loop polls, authenticates,
//! parses, resolves the session, and enqueues. Parse and auth failures turn
//! into a reply through the same transport when an outbound side exists;
//! transient poll errors back off exponentially without advancing the
//! cursor; permanent ones park the transport until operator action.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use teleclaw_core::config::{POLL_BACKOFF_BASE_SECS, POLL_BACKOFF_MAX_SECS};
use teleclaw_core::events::RelayEvent;
use teleclaw_core::types::TransportKind;
use teleclaw_parser::{parse_chat, parse_email, ParseError};
use teleclaw_sessions::SessionError;
use teleclaw_transport::{InboundEnvelope, InboundTransport, TransportError};

use crate::app::RelayApp;

/// Drive one inbound transport until shutdown.
pub async fn run_inbound_loop(
    app: Arc<RelayApp>,
    transport: Arc<dyn InboundTransport>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = transport.name().to_string();
    info!(transport = %name, "inbound loop started");

    let mut backoff_secs = POLL_BACKOFF_BASE_SECS;
    loop {
        let cursor = app.cursors.load(&name);
        match transport.poll(cursor.as_deref()).await {
            Ok(batch) => {
                backoff_secs = POLL_BACKOFF_BASE_SECS;
                for envelope in &batch.envelopes {
                    handle_envelope(&app, transport.as_ref(), envelope).await;
                }
                if let Some(new_cursor) = &batch.cursor {
                    if let Err(e) = app.cursors.save(&name, new_cursor) {
                        warn!(transport = %name, error = %e, "cursor save failed");
                    }
                }
            }
            Err(e) if e.is_transient() => {
                warn!(transport = %name, error = %e, retry_secs = backoff_secs, "transient poll failure");
                tokio::select! {
                    _ = sleep(Duration::from_secs(backoff_secs)) => {}
                    _ = shutdown.changed() => {}
                }
                backoff_secs = (backoff_secs * 2).min(POLL_BACKOFF_MAX_SECS);
            }
            Err(e) => {
                error!(transport = %name, error = %e, "permanent transport failure, stopping loop");
                return;
            }
        }

        tokio::select! {
            _ = sleep(poll_interval) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            info!(transport = %name, "inbound loop stopped");
            return;
        }
    }
}

/// Process one inbound message end to end.
pub async fn handle_envelope(
    app: &RelayApp,
    transport: &dyn InboundTransport,
    envelope: &InboundEnvelope,
) {
    // 1. Origin verification — the envelope is untrusted until this passes.
    if let Err(e) = transport.authenticate(envelope) {
        warn!(sender = %envelope.sender, error = %e, "inbound message rejected");
        reply(app, envelope, "Unauthorized.").await;
        return;
    }

    // 2. Parse out token + command.
    let parsed = match envelope.transport {
        TransportKind::Mail => {
            parse_email(envelope.subject.as_deref().unwrap_or(""), &envelope.body)
        }
        TransportKind::Chat => parse_chat(&envelope.body),
    };
    let parsed = match parsed {
        Ok(p) => p,
        Err(ParseError::NoToken) => {
            debug!(sender = %envelope.sender, "message without token ignored");
            reply(
                app,
                envelope,
                "No session token found. Reply to a notification, or start your message with: Token XXXXXXXX",
            )
            .await;
            return;
        }
        Err(ParseError::UnknownTokenFormat) => {
            reply(
                app,
                envelope,
                "Malformed token. Tokens are 8 letters or digits, e.g. /cmd ABCD1234 <command>",
            )
            .await;
            return;
        }
        Err(ParseError::EmptyCommand) => {
            reply(
                app,
                envelope,
                "Your reply was empty after removing quoted text. Write the command above the quoted message.",
            )
            .await;
            return;
        }
    };

    // 3. Resolve the session.
    let now = app.clock.now();
    let session = match app.sessions.find_by_token(&parsed.token, now) {
        Ok(s) => s,
        Err(SessionError::NotFound { .. }) => {
            info!(token = %parsed.token, "reply for unknown or expired token");
            reply(app, envelope, "Token expired. Wait for the next notification.").await;
            return;
        }
        Err(e) => {
            error!(token = %parsed.token, error = %e, "session lookup failed");
            reply(app, envelope, "Something went wrong. Try again later.").await;
            return;
        }
    };

    // 4. The token must be used over its own transport by its own recipient.
    let sender_matches = match envelope.transport {
        TransportKind::Mail => envelope.sender.eq_ignore_ascii_case(&session.recipient),
        TransportKind::Chat => envelope.sender == session.recipient,
    };
    if session.transport != envelope.transport || !sender_matches {
        warn!(
            token = %parsed.token,
            sender = %envelope.sender,
            bound_to = %session.recipient,
            "sender not bound to session"
        );
        reply(app, envelope, "Unauthorized.").await;
        return;
    }

    // 5. Enqueue and acknowledge.
    let queue_id = match app.queue.enqueue(&session.id, &parsed.command, now) {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "enqueue failed");
            reply(app, envelope, "Something went wrong. Try again later.").await;
            return;
        }
    };

    if let Err(e) = app.sessions.increment_command_count(&session.id) {
        warn!(session_id = %session.id, error = %e, "command count bump failed");
    }

    info!(
        queue_id = %queue_id,
        session_id = %session.id,
        pane = %session.pane,
        "command accepted"
    );
    app.events.emit(RelayEvent::CommandQueued {
        queue_id,
        session_id: session.id.clone(),
    });

    reply(
        app,
        envelope,
        &format!("Queued for {}: {}", session.project, parsed.command),
    )
    .await;
}

/// Best-effort reply through the transport the message came in on.
async fn reply(app: &RelayApp, envelope: &InboundEnvelope, text: &str) {
    let name = envelope.transport.to_string();
    let Some(outbound) = app.outbound.get(&name) else {
        debug!(transport = %name, "no outbound side, reply dropped");
        return;
    };
    if let Err(e) = outbound.reply(envelope, text).await {
        match e {
            TransportError::Permanent(_) => warn!(transport = %name, error = %e, "reply failed permanently"),
            _ => debug!(transport = %name, error = %e, "reply failed"),
        }
    }
}
