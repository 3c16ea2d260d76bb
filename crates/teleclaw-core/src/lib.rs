pub mod config;
pub mod error;
pub mod events;
pub mod fsutil;
pub mod ids;
pub mod types;

pub use error::{Result, TeleclawError};
pub use types::{NotificationPayload, TransportKind};
