use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use teleclaw_core::types::TransportKind;

/// A message received from an inbound transport, normalized for the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub transport: TransportKind,

    /// Platform-native sender identity (email address, chat user id). The
    /// controller compares this against the session's bound recipient.
    pub sender: String,

    /// Subject line; `None` for transports without one.
    pub subject: Option<String>,

    /// Plain-text body or message text.
    pub body: String,

    /// Group/room the message came from, when not a direct message.
    pub group: Option<String>,

    /// One-shot handle for replying in-context (chat reply token). Replies
    /// fall back to `sender` when absent.
    pub reply_handle: Option<String>,

    pub received_at: DateTime<Utc>,
}

/// The result of one inbound poll: messages strictly newer than the cursor
/// handed in, plus the cursor to persist for the next poll.
#[derive(Debug, Clone)]
pub struct PollBatch {
    pub envelopes: Vec<InboundEnvelope>,
    /// `None` means the watermark did not move.
    pub cursor: Option<String>,
}

impl PollBatch {
    pub fn empty() -> Self {
        Self {
            envelopes: Vec::new(),
            cursor: None,
        }
    }
}
