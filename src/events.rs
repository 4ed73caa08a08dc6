//! Process-wide domain event channel. Any collaborator may publish; the
//! refresh scheduler subscribes and reacts with a settle-delayed silent
//! refresh.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Named domain events carried on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEvent {
    EntryAdded,
    PaymentCompleted,
    VisitStarted,
    StatusChanged,
    DateChanged,
}

/// Broadcast wrapper. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to all current subscribers. A bus with no subscribers
    /// drops the event silently.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event.clone());
        tracing::debug!(?event, "Domain event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
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
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(DomainEvent::PaymentCompleted);
        assert_eq!(rx.recv().await.unwrap(), DomainEvent::PaymentCompleted);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.publish(DomainEvent::EntryAdded);
    }

    #[tokio::test]
    async fn clones_share_the_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.clone().publish(DomainEvent::VisitStarted);
        assert_eq!(rx.recv().await.unwrap(), DomainEvent::VisitStarted);
    }
}
