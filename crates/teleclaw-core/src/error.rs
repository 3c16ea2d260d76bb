use thiserror::Error;

#[derive(Debug, Error)]
pub enum TeleclawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error ({transport}): {reason}")]
    Transport { transport: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Token expired: {0}")]
    ExpiredToken(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Injection error: {0}")]
    Injection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TeleclawError {
    /// Short error code string used in status output and event payloads.
    pub fn code(&self) -> &'static str {
        match self {
            TeleclawError::Config(_) => "CONFIG_ERROR",
            TeleclawError::Transport { .. } => "TRANSPORT_ERROR",
            TeleclawError::Parse(_) => "PARSE_ERROR",
            TeleclawError::Unauthorized(_) => "UNAUTHORIZED",
            TeleclawError::ExpiredToken(_) => "EXPIRED_TOKEN",
            TeleclawError::Session(_) => "SESSION_ERROR",
            TeleclawError::Queue(_) => "QUEUE_ERROR",
            TeleclawError::Injection(_) => "INJECTION_ERROR",
            TeleclawError::Serialization(_) => "SERIALIZATION_ERROR",
            TeleclawError::Io(_) => "IO_ERROR",
            TeleclawError::Timeout { .. } => "TIMEOUT",
            TeleclawError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TeleclawError>;
