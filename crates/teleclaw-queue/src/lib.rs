pub mod error;
pub mod queue;
pub mod types;

pub use error::{QueueError, Result};
pub use queue::CommandQueue;
pub use types::{CommandStatus, QueuedCommand};
