use thiserror::Error;

/// Transport failures, tagged by recoverability.
///
/// The retry policy lives in the type: the controller backs off and re-polls
/// on `Transient` without advancing the cursor, and parks the transport on
/// `Permanent` until operator action. Authentication rejections are their own
/// variant because they produce a user-visible reply, not a retry.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection loss, rate limit, temporary service failure. Retried.
    #[error("transient transport error: {0}")]
    Transient(String),

    /// Misconfiguration or a 4xx-class rejection. Not retried.
    #[error("permanent transport error: {0}")]
    Permanent(String),

    /// The message failed sender/signature verification.
    #[error("unauthorized sender: {0}")]
    Unauthorized(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
