//! Event bus for ticket scheduling
//!
//! Broadcast pub/sub over a Tokio channel. Publishing never blocks and never
//! fails for lack of subscribers; slow subscribers observe `Lagged`.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::SchedulerEvent;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Broadcast event bus
pub struct EventBus {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SchedulerEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if the bus has any subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by ticket ID
    pub ticket_id: Option<String>,
    /// Filter by event types (`"ticket:queued"`, ...)
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by ticket ID. Events without a ticket id never match.
    pub fn ticket(mut self, ticket_id: &str) -> Self {
        self.ticket_id = Some(ticket_id.to_string());
        self
    }

    /// Filter by event types
    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &SchedulerEvent) -> bool {
        if let Some(ref tid) = self.ticket_id {
            if event.ticket_id() != Some(tid.as_str()) {
                return false;
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        true
    }
}

/// Filtered event receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<SchedulerEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<SchedulerEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<SchedulerEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Drain already-buffered events, returning the matching ones.
    pub fn drain(&mut self) -> Vec<SchedulerEvent> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => out.push(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }
}

/// Extension trait for subscribing with filters
pub trait EventBusExt {
    /// Subscribe with a filter
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

impl EventBusExt for SharedEventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Lane;
    use crate::ticket::Priority;
    use chrono::Utc;

    fn queued(id: &str) -> SchedulerEvent {
        SchedulerEvent::TicketQueued {
            ticket_id: id.to_string(),
            lane: Lane::General,
            priority: Priority::P2,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(SchedulerEvent::ticket_created("t-1"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "ticket:created");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert!(!bus.has_subscribers());
        bus.publish(queued("t-1"));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new().shared();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(queued("t-1"));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();

        assert_eq!(e1.event_type(), e2.event_type());
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::new()
            .ticket("t-1")
            .types(vec!["ticket:queued", "ticket:escalated"]);

        let non_matching_ticket = queued("t-2");
        let non_matching_type = SchedulerEvent::ticket_created("t-1");
        let no_ticket = SchedulerEvent::IdleWatchdogTriggered {
            idle_minutes: 5,
            timestamp: Utc::now(),
        };

        assert!(filter.matches(&queued("t-1")));
        assert!(!filter.matches(&non_matching_ticket));
        assert!(!filter.matches(&non_matching_type));
        assert!(!filter.matches(&no_ticket));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = EventBus::new().shared();
        let mut filtered = bus.subscribe_filtered(EventFilter::new().ticket("target"));

        let bus_clone = Arc::clone(&bus);
        tokio::spawn(async move {
            bus_clone.publish(queued("other"));
            bus_clone.publish(queued("target"));
        });

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.ticket_id(), Some("target"));
    }

    #[test]
    fn test_drain() {
        let bus = EventBus::new();
        let mut filtered = bus.subscribe_filtered(EventFilter::new().types(vec!["ticket:queued"]));
        bus.publish(queued("a"));
        bus.publish(SchedulerEvent::ticket_created("b"));
        bus.publish(queued("c"));

        let ids: Vec<_> = filtered
            .drain()
            .iter()
            .filter_map(|e| e.ticket_id().map(String::from))
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
