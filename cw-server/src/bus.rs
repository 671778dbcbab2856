use cw_core::event::{Event, EventBus};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_BUFFER: usize = 100;

/// Event bus backed by a broadcast channel.
///
/// The socket layer subscribes and forwards to the portal; emission never
/// blocks and an event with no listener is dropped.
pub struct BroadcastBus {
    tx: broadcast::Sender<Event>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for BroadcastBus {
    fn emit(&self, event: Event) {
        debug!("emitting {}", event.name());
        // Ignore errors (no receivers).
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = BroadcastBus::new();
        let mut rx = bus.subscribe();

        bus.emit(Event::NewProjectAdded {
            project_id: "p1".to_string(),
            ignored_paths: None,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "newProjectAdded");
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = BroadcastBus::new();
        bus.emit(Event::NewProjectAdded {
            project_id: "p1".to_string(),
            ignored_paths: None,
        });
    }
}
