//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::{ItemId, OrderId};
use lifecycle_log::{LifecycleEventType, Sequence};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are facts that have happened. Each one is persisted as one
/// lifecycle event whose payload is the serialized domain event.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// The lifecycle event type this event is recorded as.
    fn event_type(&self) -> LifecycleEventType;

    /// The item the event concerns, None for order-wide events.
    fn item_id(&self) -> Option<ItemId>;

    /// When the event happened. Used as the lifecycle event timestamp.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Trait for aggregates rebuilt from the lifecycle log.
///
/// Aggregates:
/// - Are rebuilt by replaying events in sequence order
/// - Generate events from commands
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<OrderId>;

    /// Sequence of the last applied event; 0 for a new aggregate.
    fn sequence(&self) -> Sequence;

    /// Called by the command handler after loading events.
    fn set_sequence(&mut self, sequence: Sequence);

    /// Applies an event to the aggregate.
    ///
    /// Must be pure and deterministic, and must not fail: events are facts
    /// that already happened.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { id: OrderId, at: DateTime<Utc> },
        Touched { item_id: ItemId, at: DateTime<Utc> },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> LifecycleEventType {
            match self {
                TestEvent::Created { .. } => LifecycleEventType::OrderPlaced,
                TestEvent::Touched { .. } => LifecycleEventType::ItemStatusChanged,
            }
        }

        fn item_id(&self) -> Option<ItemId> {
            match self {
                TestEvent::Created { .. } => None,
                TestEvent::Touched { item_id, .. } => Some(*item_id),
            }
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            match self {
                TestEvent::Created { at, .. } | TestEvent::Touched { at, .. } => *at,
            }
        }
    }

    #[derive(Debug, Default)]
    struct TestAggregate {
        id: Option<OrderId>,
        touches: u32,
        sequence: Sequence,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test error")]
    struct TestError;

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn id(&self) -> Option<OrderId> {
            self.id
        }

        fn sequence(&self) -> Sequence {
            self.sequence
        }

        fn set_sequence(&mut self, sequence: Sequence) {
            self.sequence = sequence;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created { id, .. } => self.id = Some(id),
                TestEvent::Touched { .. } => self.touches += 1,
            }
        }
    }

    #[test]
    fn apply_events_in_order() {
        let id = OrderId::new();
        let mut aggregate = TestAggregate::default();
        aggregate.apply_events(vec![
            TestEvent::Created { id, at: Utc::now() },
            TestEvent::Touched {
                item_id: ItemId::new(),
                at: Utc::now(),
            },
        ]);

        assert_eq!(aggregate.id(), Some(id));
        assert_eq!(aggregate.touches, 1);
        assert_eq!(aggregate.sequence(), Sequence::initial());
    }

    #[test]
    fn event_metadata() {
        let item_id = ItemId::new();
        let event = TestEvent::Touched {
            item_id,
            at: Utc::now(),
        };
        assert_eq!(event.event_type(), LifecycleEventType::ItemStatusChanged);
        assert_eq!(event.item_id(), Some(item_id));
    }
}
