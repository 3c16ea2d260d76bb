//! teleclaw-chat — the chat-bot transport adapter.
//!
//! Inbound is push, not poll: the bot platform POSTs signed webhook events
//! to an axum server. Verified events are buffered in-process and handed to
//! the controller through the same poll+cursor contract the mail adapter
//! uses — the cursor is a monotonically increasing update offset, so webhook
//! re-deliveries after a restart are deduplicated. Replies and notification
//! pushes go out through the platform's HTTP API via `reqwest`.

pub mod adapter;
pub mod allow;
pub mod verify;
pub mod webhook;

pub use adapter::ChatTransport;
pub use webhook::{router, serve};
