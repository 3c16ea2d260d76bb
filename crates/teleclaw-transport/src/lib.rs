pub mod cursor;
pub mod error;
pub mod transport;
pub mod types;

pub use cursor::CursorStore;
pub use error::{Result, TransportError};
pub use transport::{InboundTransport, OutboundTransport};
pub use types::{InboundEnvelope, PollBatch};
