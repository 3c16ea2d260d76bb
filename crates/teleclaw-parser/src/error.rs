use thiserror::Error;

/// Reply-parse rejections. These are reported back to the user through the
/// originating transport and never enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No token in the subject tag, body line, or chat command form.
    #[error("no session token found in message")]
    NoToken,

    /// A chat command form was recognized but the token is malformed
    /// (wrong length or non-alphanumeric characters).
    #[error("malformed session token in command")]
    UnknownTokenFormat,

    /// The command was whitespace-only after quote stripping.
    #[error("empty command after stripping quoted text")]
    EmptyCommand,
}

pub type Result<T> = std::result::Result<T, ParseError>;
