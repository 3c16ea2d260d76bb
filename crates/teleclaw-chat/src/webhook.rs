//! Webhook ingress — POST /webhook, plus GET /health.
//!
//! The platform re-delivers on non-2xx, so the handler only rejects what is
//! genuinely wrong: a bad signature (401) or an unparseable body (400).
//! Events without message text (stickers, joins) are acknowledged and
//! dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::adapter::ChatTransport;
use crate::verify::{verify_signature, SIGNATURE_HEADER};

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent {
    message: Option<WebhookMessage>,
    source: Option<WebhookSource>,
    reply_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookSource {
    user_id: Option<String>,
    group_id: Option<String>,
}

/// Assemble the chat ingress router.
pub fn router(adapter: Arc<ChatTransport>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(adapter)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bind and serve the ingress until the process exits.
pub async fn serve(adapter: Arc<ChatTransport>, bind: &str, port: u16) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{e}")))?;
    info!(%addr, "chat webhook listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(adapter)).await
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn webhook_handler(
    State(adapter): State<Arc<ChatTransport>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| auth_error("missing signature header"))?;

    verify_signature(adapter.config().channel_secret.as_str(), &body, signature)
        .map_err(|e| auth_error(&e))?;

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid JSON in webhook body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid JSON body"})),
        )
    })?;

    let mut accepted = 0usize;
    for event in &payload.events {
        let Some(text) = event.message.as_ref().and_then(|m| m.text.as_deref()) else {
            continue;
        };
        let Some(source) = &event.source else {
            continue;
        };
        let Some(user_id) = source.user_id.as_deref() else {
            continue;
        };

        adapter.push_event(
            user_id,
            source.group_id.as_deref(),
            text,
            event.reply_token.as_deref(),
        );
        accepted += 1;
    }

    info!(accepted, total = payload.events.len(), "webhook accepted");
    Ok(Json(json!({ "ok": true, "accepted": accepted })))
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason, "webhook authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed"})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::sign;
    use teleclaw_core::config::ChatConfig;

    fn adapter() -> Arc<ChatTransport> {
        Arc::new(ChatTransport::new(
            ChatConfig {
                channel_secret: "secret".into(),
                channel_token: "token".into(),
                api_base: "http://127.0.0.1:9".into(),
                bind: "127.0.0.1".into(),
                port: 0,
                allow_users: vec!["*".into()],
                allow_groups: vec![],
            },
            0,
        ))
    }

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, sign("secret", body).parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn valid_event_is_buffered() {
        let adapter = adapter();
        let body = br#"{"events":[{"message":{"text":"/cmd ABCDEFGH hi"},"source":{"userId":"U1"},"replyToken":"r1"}]}"#;

        let result = webhook_handler(
            State(Arc::clone(&adapter)),
            signed_headers(body),
            Bytes::from_static(body),
        )
        .await;
        assert!(result.is_ok());

        use teleclaw_transport::transport::InboundTransport;
        let batch = adapter.poll(None).await.unwrap();
        assert_eq!(batch.envelopes.len(), 1);
        assert_eq!(batch.envelopes[0].sender, "U1");
        assert_eq!(batch.envelopes[0].reply_handle.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let adapter = adapter();
        let body = br#"{"events":[]}"#;
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, sign("wrong", body).parse().unwrap());

        let err = webhook_handler(State(adapter), headers, Bytes::from_static(body))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let adapter = adapter();
        let body = br#"{"events":[]}"#;
        let err = webhook_handler(State(adapter), HeaderMap::new(), Bytes::from_static(body))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn textless_events_are_acknowledged_not_buffered() {
        let adapter = adapter();
        let body = br#"{"events":[{"source":{"userId":"U1"}}]}"#;

        let result = webhook_handler(
            State(Arc::clone(&adapter)),
            signed_headers(body),
            Bytes::from_static(body),
        )
        .await
        .unwrap();
        assert_eq!(result.0["accepted"], 0);
    }
}
