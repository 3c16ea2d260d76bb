use thiserror::Error;

/// Errors that can occur while delivering a command to a pane.
#[derive(Debug, Error)]
pub enum InjectorError {
    /// The multiplexer binary could not be found on PATH.
    #[error("multiplexer unavailable: {0}")]
    MultiplexerUnavailable(String),

    /// The named pane does not exist and bootstrapping it failed.
    #[error("pane missing: {0}")]
    PaneMissing(String),

    /// The confirmation loop exhausted its attempts without reaching an
    /// idle prompt. Drives the command into the queue's retry path.
    #[error("no idle prompt after {attempts} confirmation attempts")]
    InjectionTimeout { attempts: u32 },

    /// The assistant printed an error in response to the command.
    #[error("assistant reported an error: {0}")]
    AssistantError(String),

    /// A multiplexer CLI invocation exited non-zero.
    #[error("multiplexer command failed: {0}")]
    CommandFailed(String),

    #[error("injector I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InjectorError {
    /// Unrecoverable errors skip the retry path entirely.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, InjectorError::MultiplexerUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, InjectorError>;
