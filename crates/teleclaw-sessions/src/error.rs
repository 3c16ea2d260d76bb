use thiserror::Error;

/// Errors that can occur during session registry operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No live (unexpired) session holds this token.
    #[error("session not found for token: {token}")]
    NotFound { token: String },

    /// Another live session already holds the candidate token; the caller
    /// must retry with a freshly minted one.
    #[error("duplicate token: {token}")]
    DuplicateToken { token: String },

    /// Eight consecutive mint attempts collided with live tokens.
    #[error("token space exhausted after {attempts} attempts")]
    TokenSpaceExhausted { attempts: u32 },

    /// The record is internally inconsistent (e.g. expires_at <= created_at).
    #[error("invalid session record: {0}")]
    InvalidRecord(String),

    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
