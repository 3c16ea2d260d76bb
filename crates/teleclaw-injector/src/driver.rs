use async_trait::async_trait;

use crate::error::Result;

/// Named control keys the injector sends.
///
/// `CtrlU` clears the assistant's input line; `CtrlC` is deliberately absent
/// from this enum — interrupting the assistant process is never allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    CtrlU,
    Enter,
}

impl ControlKey {
    /// The multiplexer's key name for `send-keys`.
    pub fn key_name(&self) -> &'static str {
        match self {
            ControlKey::CtrlU => "C-u",
            ControlKey::Enter => "Enter",
        }
    }
}

/// Primitive operations on one named multiplexer pane.
///
/// The production implementation shells out to tmux; tests script a fake.
/// Implementations never destroy the pane — it is shared with the assistant
/// process.
#[async_trait]
pub trait PaneDriver: Send + Sync {
    /// Returns `true` when the named session exists.
    async fn has_session(&self, pane: &str) -> Result<bool>;

    /// Spawn a detached session named `pane` running `command` in `cwd`.
    async fn create_session(&self, pane: &str, cwd: &str, command: &str) -> Result<()>;

    /// Append the literal string to the pane input. No key-name
    /// interpretation and no shell in between.
    async fn send_text(&self, pane: &str, text: &str) -> Result<()>;

    /// Send a named control key.
    async fn send_key(&self, pane: &str, key: ControlKey) -> Result<()>;

    /// Return the last `lines` rendered lines of the pane.
    async fn capture(&self, pane: &str, lines: u32) -> Result<String>;
}
