use thiserror::Error;

use crate::types::CommandStatus;

/// Errors that can occur during command-queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("command not found: {id}")]
    NotFound { id: String },

    /// The requested status change is not allowed by the state machine.
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: CommandStatus,
        to: CommandStatus,
    },

    #[error("queue I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
