//! Event broadcasting.
//!
//! The scheduler and RPC handlers drain the events queued by the oracle and
//! the controller and publish them here. Each subscriber has an independent
//! buffer; slow subscribers lose the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use ballast_types::events::{Event, EventType, Severity};

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only these event types.
    pub event_types: Option<Vec<EventType>>,
    /// Minimum severity.
    pub min_severity: Option<Severity>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Parse a severity name from configuration.
    pub fn with_min_severity(name: &str) -> Self {
        let min_severity = match name {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        };
        Self {
            event_types: None,
            min_severity: Some(min_severity),
        }
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(min) = self.min_severity {
            if event.event_type.severity() < min {
                return false;
            }
        }
        true
    }
}

/// Write matching events to the log until the bus closes.
pub async fn log_events(mut rx: broadcast::Receiver<Event>, filter: EventFilter) {
    loop {
        match rx.recv().await {
            Ok(event) if filter.matches(&event) => match event.event_type.severity() {
                Severity::Critical | Severity::Warning => tracing::warn!(
                    event_type = ?event.event_type,
                    timestamp = event.timestamp,
                    payload = %event.payload,
                    "event"
                ),
                Severity::Info => tracing::info!(
                    event_type = ?event.event_type,
                    timestamp = event.timestamp,
                    payload = %event.payload,
                    "event"
                ),
            },
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType) -> Event {
        Event::new(event_type, 1_000, serde_json::json!({}))
    }

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_all([event(EventType::RebaseExecuted), event(EventType::Paused)]);

        let first = rx.try_recv().expect("receive event");
        assert_eq!(first.event_type, EventType::RebaseExecuted);
        let second = rx.try_recv().expect("receive event");
        assert_eq!(second.event_type, EventType::Paused);
        assert_eq!(bus.sequence(), 2);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit(event(EventType::PriceUpdated));
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_filter_by_severity() {
        let filter = EventFilter::with_min_severity("warning");
        assert!(filter.matches(&event(EventType::CircuitBreakerActivated)));
        assert!(filter.matches(&event(EventType::SourceRemoved)));
        assert!(!filter.matches(&event(EventType::RebaseExecuted)));

        assert!(EventFilter::with_min_severity("info").matches(&event(EventType::PriceUpdated)));
    }

    #[test]
    fn test_filter_by_type() {
        let filter = EventFilter {
            event_types: Some(vec![EventType::RebaseExecuted]),
            min_severity: None,
        };
        assert!(filter.matches(&event(EventType::RebaseExecuted)));
        assert!(!filter.matches(&event(EventType::Paused)));
    }
}
