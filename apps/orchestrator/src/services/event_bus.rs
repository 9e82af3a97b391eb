// [apps/orchestrator/src/services/event_bus.rs]
/*!
 * Typed publish/subscribe fan-out for `InventoryEvent`s. Delivery is
 * at-least-once per subscriber; a full subscriber buffer drops the
 * oldest entry for that subscriber only, never globally.
 */

use nebula_domain_models::{Event, InventoryEvent};
use tokio::sync::broadcast;
use tracing::{instrument, trace, warn};

/// Channel capacity before the broadcast ring buffer starts evicting
/// the oldest unread event for a lagging subscriber.
const CHANNEL_CAPACITY: usize = 4096;

/// Default subscriber cap when a bus is built with [`EventBus::new`].
/// Production call sites should use [`EventBus::with_limits`] wired to
/// `HeartbeatConfig::max_subscribers` instead.
const DEFAULT_MAX_SUBSCRIBERS: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    max_subscribers: usize,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(CHANNEL_CAPACITY, DEFAULT_MAX_SUBSCRIBERS)
    }

    /// Builds a bus with an explicit buffer capacity and subscriber cap,
    /// sourced from `HeartbeatConfig` rather than hardcoded, so a
    /// runaway count of SSE subscribers cannot exhaust memory.
    #[must_use]
    pub fn with_limits(channel_capacity: usize, max_subscribers: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self { sender, max_subscribers }
    }

    /// Returns a fresh receiver, or `None` when the bus is already at
    /// its subscriber cap. Each subscriber gets its own bounded buffer;
    /// a subscriber that falls behind sees `Lagged` on its next receive
    /// and should treat that as "some events were dropped," not as a
    /// fatal error.
    #[must_use]
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Event>> {
        if self.sender.receiver_count() >= self.max_subscribers {
            warn!(max_subscribers = self.max_subscribers, "event bus subscriber cap reached, rejecting subscribe");
            return None;
        }
        Some(self.sender.subscribe())
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[instrument(skip(self, payload))]
    pub fn publish(&self, payload: InventoryEvent) {
        self.dispatch(Event::new(payload));
    }

    fn dispatch(&self, event: Event) {
        match self.sender.send(event) {
            Ok(0) => trace!("event discarded, no active subscribers"),
            Ok(subscriber_count) => trace!(subscriber_count, "event broadcast"),
            Err(_) => warn!("event bus has no sender-side receivers left"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use nebula_domain_models::InventoryEvent;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe().expect("under cap");
        bus.publish(InventoryEvent::ConnectionLost {
            provider_id: Uuid::new_v4(),
            last_seen_at: chrono::Utc::now(),
        });
        let received = rx.recv().await.expect("event should be delivered");
        assert!(matches!(received.payload, InventoryEvent::ConnectionLost { .. }));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(InventoryEvent::HeartbeatReceived { provider_id: Uuid::new_v4(), round_trip_ms: 10 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribe_beyond_cap_is_rejected() {
        let bus = EventBus::with_limits(16, 2);
        let _a = bus.subscribe().expect("first subscriber under cap");
        let _b = bus.subscribe().expect("second subscriber under cap");
        assert!(bus.subscribe().is_none());
    }
}
