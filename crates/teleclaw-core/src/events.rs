use serde::Serialize;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 256;

/// Lifecycle events emitted by the relay controller.
///
/// Consumers (structured logs, the admin status surface) subscribe via
/// [`EventBus::subscribe`]; emission never blocks the relay.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    Started,
    Stopped,
    NotificationSent {
        session_id: String,
        token: String,
        transport: String,
    },
    CommandQueued {
        queue_id: String,
        session_id: String,
    },
    CommandExecuted {
        queue_id: String,
        session_id: String,
    },
    CommandFailed {
        queue_id: String,
        session_id: String,
        error: String,
        will_retry: bool,
    },
}

/// Fan-out relay events to all subscribers via a tokio broadcast channel.
pub struct EventBus {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Push an event to all subscribers. Silently drops if nobody listens.
    pub fn emit(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(RelayEvent::Started);
        match rx.recv().await.unwrap() {
            RelayEvent::Started => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(RelayEvent::Stopped);
    }
}
