use async_trait::async_trait;

use crate::error::Result;

/// A pluggable command-delivery backend.
///
/// The relay dispatcher only knows this trait: the tmux injector
/// ([`crate::PaneInjector`]) and the drop-folder fallback
/// ([`crate::DropFolderBackend`]) both implement it. `deliver` must be safe
/// against duplicate invocation with the same command — recovery after a
/// crash re-dispatches at-least-once.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `command` to the pane named `pane`, blocking until the
    /// assistant accepted it (or the backend's notion thereof).
    async fn deliver(&self, pane: &str, command: &str) -> Result<()>;

    /// Abort an in-flight delivery as far as the backend can.
    async fn cancel(&self, pane: &str) -> Result<()>;
}
