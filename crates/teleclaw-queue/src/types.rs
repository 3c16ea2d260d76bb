use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use teleclaw_core::config::DEFAULT_MAX_RETRIES;

/// Lifecycle state of a queued command.
///
/// Transitions: queued → executing → (completed | failed | cancelled).
/// A failed command with retries left goes back to queued with a delayed
/// `retry_at`; cancellation is allowed from queued and executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Queued,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl CommandStatus {
    /// Terminal states are eligible for `cleanup`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Completed | CommandStatus::Failed | CommandStatus::Cancelled
        )
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommandStatus::Queued => "queued",
            CommandStatus::Executing => "executing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
            CommandStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(CommandStatus::Queued),
            "executing" => Ok(CommandStatus::Executing),
            "completed" => Ok(CommandStatus::Completed),
            "failed" => Ok(CommandStatus::Failed),
            "cancelled" => Ok(CommandStatus::Cancelled),
            other => Err(format!("unknown command status: {other}")),
        }
    }
}

/// A persisted queue entry.
///
/// Field names serialize in camelCase — the on-disk `queue.json` format is
/// shared with external tooling that inspects the `commandQueue` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCommand {
    /// Time-prefixed id: `{unix_millis}-{4 hex}`. Sorts by enqueue time.
    pub id: String,
    /// Weak reference — valid only while the session is unexpired.
    pub session_id: String,
    /// The payload, injected verbatim.
    pub command: String,
    pub status: CommandStatus,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    /// Earliest time a retried command may be dispatched again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Last failure message, kept across retries for the status surface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl QueuedCommand {
    pub fn new(id: String, session_id: &str, command: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            session_id: session_id.to_string(),
            command: command.to_string(),
            status: CommandStatus::Queued,
            queued_at: now,
            executed_at: None,
            completed_at: None,
            failed_at: None,
            retry_at: None,
            retries: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            error: None,
        }
    }

    /// Ready to dispatch: queued and past any retry delay.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == CommandStatus::Queued && self.retry_at.is_none_or(|t| t <= now)
    }
}
