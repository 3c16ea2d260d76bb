use async_trait::async_trait;

use teleclaw_core::types::NotificationPayload;

use crate::error::Result;
use crate::types::{InboundEnvelope, PollBatch};

/// Inbound capability: fetch new messages and verify their origin.
///
/// Implementations must be `Send + Sync`; the controller drives each inbound
/// transport from its own Tokio task.
#[async_trait]
pub trait InboundTransport: Send + Sync {
    /// Stable lowercase identifier, also the cursor file name.
    fn name(&self) -> &str;

    /// Fetch messages strictly newer than `cursor`. Calling again with the
    /// same cursor must not re-deliver — the watermark only moves when the
    /// returned batch is processed and its cursor persisted.
    async fn poll(&self, cursor: Option<&str>) -> Result<PollBatch>;

    /// Transport-specific origin verification (sender allowlist, webhook
    /// signature). The controller never trusts an envelope before this
    /// passes.
    fn authenticate(&self, envelope: &InboundEnvelope) -> Result<()>;
}

/// Outbound capability: deliver notifications and replies.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Render `payload` into the transport's native message and deliver it
    /// to `recipient`. Returns an opaque message reference for the audit log.
    async fn send(&self, recipient: &str, payload: &NotificationPayload) -> Result<String>;

    /// Short free-text reply in the context of an inbound message — used for
    /// acknowledgements and parse/auth error reports.
    async fn reply(&self, envelope: &InboundEnvelope, text: &str) -> Result<()>;
}
