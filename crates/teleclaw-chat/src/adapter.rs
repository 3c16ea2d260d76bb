//! The chat transport: buffered webhook inbound, HTTP API outbound.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use teleclaw_core::config::ChatConfig;
use teleclaw_core::types::{NotificationPayload, TransportKind};
use teleclaw_transport::error::{Result, TransportError};
use teleclaw_transport::transport::{InboundTransport, OutboundTransport};
use teleclaw_transport::types::{InboundEnvelope, PollBatch};

use crate::allow;

pub struct ChatTransport {
    config: ChatConfig,
    client: reqwest::Client,
    /// Verified webhook events waiting for the controller's next poll.
    buffer: Mutex<VecDeque<(u64, InboundEnvelope)>>,
    /// Next update offset to assign. Seeded past the persisted cursor so a
    /// restart cannot reuse offsets the controller already consumed.
    next_offset: AtomicU64,
}

impl ChatTransport {
    /// `initial_offset` is the last persisted cursor value (0 when none).
    pub fn new(config: ChatConfig, initial_offset: u64) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            buffer: Mutex::new(VecDeque::new()),
            next_offset: AtomicU64::new(initial_offset + 1),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Buffer one signature-verified webhook event. Called by the webhook
    /// handler; allowlist checking happens later in `authenticate`.
    pub fn push_event(
        &self,
        user_id: &str,
        group_id: Option<&str>,
        text: &str,
        reply_token: Option<&str>,
    ) -> u64 {
        let offset = self.next_offset.fetch_add(1, Ordering::Relaxed);
        let envelope = InboundEnvelope {
            transport: TransportKind::Chat,
            sender: user_id.to_string(),
            subject: None,
            body: text.to_string(),
            group: group_id.map(str::to_string),
            reply_handle: reply_token.map(str::to_string),
            received_at: Utc::now(),
        };
        self.buffer.lock().unwrap().push_back((offset, envelope));
        debug!(offset, user_id, "chat event buffered");
        offset
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}{path}", self.config.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.channel_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Transient(format!("chat api: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            Err(TransportError::Transient(format!("chat api {status}: {detail}")))
        } else {
            Err(TransportError::Permanent(format!("chat api {status}: {detail}")))
        }
    }

    fn text_message(text: &str) -> serde_json::Value {
        json!({ "type": "text", "text": text })
    }
}

#[async_trait]
impl InboundTransport for ChatTransport {
    fn name(&self) -> &str {
        "chat"
    }

    /// Drain buffered events with an offset above `cursor`. The buffer only
    /// holds verified events, so a poll is local and never fails transiently.
    async fn poll(&self, cursor: Option<&str>) -> Result<PollBatch> {
        let floor: u64 = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);

        let mut buffer = self.buffer.lock().unwrap();
        let mut envelopes = Vec::new();
        let mut last = None;

        while let Some((offset, envelope)) = buffer.pop_front() {
            // Offsets at or below the cursor were consumed before a restart.
            if offset > floor {
                envelopes.push(envelope);
                last = Some(offset);
            }
        }

        Ok(PollBatch {
            envelopes,
            cursor: last.map(|o| o.to_string()),
        })
    }

    fn authenticate(&self, envelope: &InboundEnvelope) -> Result<()> {
        let ok = allow::is_allowed(
            &self.config.allow_users,
            &self.config.allow_groups,
            &envelope.sender,
            envelope.group.as_deref(),
        );
        if ok {
            Ok(())
        } else {
            Err(TransportError::Unauthorized(envelope.sender.clone()))
        }
    }
}

#[async_trait]
impl OutboundTransport for ChatTransport {
    fn name(&self) -> &str {
        "chat"
    }

    async fn send(&self, recipient: &str, payload: &NotificationPayload) -> Result<String> {
        let text = format!("{}\n\n{}", payload.subject, payload.body);
        let mut messages = vec![Self::text_message(&text)];
        for action in &payload.actions {
            messages.push(Self::text_message(action));
        }

        self.post("/push", json!({ "to": recipient, "messages": messages }))
            .await?;
        info!(recipient, token = %payload.token, "notification pushed");
        Ok(format!("chat:{}", payload.session_id))
    }

    async fn reply(&self, envelope: &InboundEnvelope, text: &str) -> Result<()> {
        match &envelope.reply_handle {
            Some(token) => {
                self.post(
                    "/reply",
                    json!({ "replyToken": token, "messages": [Self::text_message(text)] }),
                )
                .await
            }
            None => {
                warn!(sender = %envelope.sender, "no reply token, falling back to push");
                self.post(
                    "/push",
                    json!({ "to": envelope.sender, "messages": [Self::text_message(text)] }),
                )
                .await
            }
        }
    }
}
