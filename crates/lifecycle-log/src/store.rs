use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{
    EventId, LifecycleEvent, LifecycleLogError, LifecycleQuery, NotificationChannel,
    NotificationOutcome, OrderId, Result, Sequence,
};

/// Options for appending events to the log.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Sequence the order must currently be at for the append to succeed.
    /// If None, no check is performed (use with caution).
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    /// Creates options with no sequence check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the order to be at a specific sequence.
    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }

    /// Expects the order to have no events yet.
    pub fn expect_new() -> Self {
        Self {
            expected_sequence: Some(Sequence::initial()),
        }
    }
}

/// A stream of lifecycle events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<LifecycleEvent>> + Send>>;

/// Storage backend for the lifecycle log.
///
/// Events are never updated or deleted. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Appends the events of one operation.
    ///
    /// The append is atomic: either every event is stored or none is. If
    /// `options.expected_sequence` is set and the order is at a different
    /// sequence, fails with `ConcurrencyConflict` and writes nothing.
    ///
    /// Returns the order's sequence after the append.
    async fn append(&self, events: Vec<LifecycleEvent>, options: AppendOptions)
    -> Result<Sequence>;

    /// Returns every event of an order in sequence order.
    async fn events_for_order(&self, order_id: OrderId) -> Result<Vec<LifecycleEvent>>;

    /// Returns an order's events starting at `from_sequence` (inclusive).
    async fn events_for_order_from(
        &self,
        order_id: OrderId,
        from_sequence: Sequence,
    ) -> Result<Vec<LifecycleEvent>>;

    /// Returns events matching a query.
    async fn query_events(&self, query: LifecycleQuery) -> Result<Vec<LifecycleEvent>>;

    /// Streams all events in insertion order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Returns the order's current sequence, or None if it has no events.
    async fn current_sequence(&self, order_id: OrderId) -> Result<Option<Sequence>>;

    /// Appends a notification attempt for an event.
    async fn record_notification(
        &self,
        event_id: EventId,
        channel: NotificationChannel,
        outcome: NotificationOutcome,
    ) -> Result<()>;
}

/// Convenience methods available on every store.
#[async_trait]
pub trait LifecycleStoreExt: LifecycleStore {
    /// Appends a single event.
    async fn append_event(&self, event: LifecycleEvent, options: AppendOptions) -> Result<Sequence> {
        self.append(vec![event], options).await
    }

    /// Checks if an order has any events.
    async fn order_exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.current_sequence(order_id).await?.is_some())
    }
}

impl<T: LifecycleStore + ?Sized> LifecycleStoreExt for T {}

/// Checks that a batch is non-empty, targets a single order and carries
/// consecutive sequences.
pub fn validate_events_for_append(events: &[LifecycleEvent]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(LifecycleLogError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    let mut expected_sequence = first.sequence;
    for event in events.iter().skip(1) {
        if event.order_id != first.order_id {
            return Err(LifecycleLogError::InvalidAppend(
                "All events must be for the same order".to_string(),
            ));
        }
        expected_sequence = expected_sequence.next();
        if event.sequence != expected_sequence {
            return Err(LifecycleLogError::InvalidAppend(format!(
                "Event sequences must be consecutive. Expected {}, got {}",
                expected_sequence, event.sequence
            )));
        }
    }

    Ok(())
}
