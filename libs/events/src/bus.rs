//! Event bus seam and the in-process broadcast implementation.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::EventError;
use crate::types::{DiscoveryEvent, EventEnvelope};

/// Sink for discovery events.
///
/// Publishes are at-most-once: the publisher never retries and callers never
/// await acknowledgment. Implementations must not block for long and must not
/// panic into the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DiscoveryEvent) -> Result<(), EventError>;
}

/// In-process event bus backed by a tokio broadcast channel.
///
/// Slow subscribers are lagged out rather than backpressuring the publisher,
/// matching the at-most-once contract.
pub struct BroadcastBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EventPublisher for BroadcastBus {
    async fn publish(&self, event: DiscoveryEvent) -> Result<(), EventError> {
        let event_type = event.event_type();
        let count = event.services().len();

        // A send error only means there are no subscribers right now, which
        // is fine for an unacknowledged bus.
        let delivered = self.tx.send(EventEnvelope::now(event)).unwrap_or(0);

        debug!(
            event_type,
            services = count,
            subscribers = delivered,
            "Published discovery event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = BroadcastBus::new(8);
        bus.publish(DiscoveryEvent::ServicesChanged(vec![]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_receives_envelope() {
        let bus = BroadcastBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(DiscoveryEvent::ServicesRemoved(vec![]))
            .await
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(
            envelope.event.event_type(),
            crate::event_types::SERVICES_REMOVED
        );
    }
}
