use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    EventId, LifecycleEvent, LifecycleLogError, LifecycleQuery, NotificationChannel,
    NotificationOutcome, NotificationRecord, OrderId, Result, Sequence,
    store::{AppendOptions, EventStream, LifecycleStore, validate_events_for_append},
};

#[derive(Debug, Default)]
struct LogState {
    /// Insertion order doubles as the global order.
    events: Vec<LifecycleEvent>,
    event_ids: HashSet<EventId>,
    heads: HashMap<OrderId, Sequence>,
    notifications: HashMap<EventId, Vec<(NotificationChannel, NotificationOutcome)>>,
}

impl LogState {
    fn with_notifications(&self, event: &LifecycleEvent) -> LifecycleEvent {
        let mut event = event.clone();
        if let Some(attempts) = self.notifications.get(&event.event_id) {
            let mut latest = BTreeMap::new();
            for (channel, outcome) in attempts {
                latest.insert(*channel, NotificationRecord::from(outcome));
            }
            event.notifications = latest;
        }
        event
    }
}

/// In-memory lifecycle store for tests and single-process runs.
///
/// A single lock covers the check and the write of an append, so the
/// expected-sequence check is linearizable across tasks.
#[derive(Clone, Default)]
pub struct InMemoryLifecycleStore {
    state: Arc<RwLock<LogState>>,
}

impl InMemoryLifecycleStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Returns the total number of notification attempts recorded.
    pub async fn notification_attempt_count(&self) -> usize {
        self.state
            .read()
            .await
            .notifications
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn append(
        &self,
        events: Vec<LifecycleEvent>,
        options: AppendOptions,
    ) -> Result<Sequence> {
        validate_events_for_append(&events)?;

        let order_id = events[0].order_id;
        let first_sequence = events[0].sequence;

        let mut state = self.state.write().await;
        let current = state
            .heads
            .get(&order_id)
            .copied()
            .unwrap_or(Sequence::initial());

        if let Some(expected) = options.expected_sequence
            && current != expected
        {
            return Err(LifecycleLogError::ConcurrencyConflict {
                order_id,
                expected,
                actual: current,
            });
        }

        // Same effect as the (order_id, sequence) unique constraint.
        if first_sequence != current.next() {
            return Err(LifecycleLogError::ConcurrencyConflict {
                order_id,
                expected: options.expected_sequence.unwrap_or(current),
                actual: current,
            });
        }

        if events.iter().any(|e| state.event_ids.contains(&e.event_id)) {
            return Err(LifecycleLogError::InvalidAppend(
                "Duplicate event id".to_string(),
            ));
        }

        let last_sequence = events
            .last()
            .map(|e| e.sequence)
            .unwrap_or(Sequence::initial());

        for event in events {
            state.event_ids.insert(event.event_id);
            state.events.push(event);
        }
        state.heads.insert(order_id, last_sequence);

        Ok(last_sequence)
    }

    async fn events_for_order(&self, order_id: OrderId) -> Result<Vec<LifecycleEvent>> {
        self.events_for_order_from(order_id, Sequence::first()).await
    }

    async fn events_for_order_from(
        &self,
        order_id: OrderId,
        from_sequence: Sequence,
    ) -> Result<Vec<LifecycleEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.order_id == order_id && e.sequence >= from_sequence)
            .map(|e| state.with_notifications(e))
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    async fn query_events(&self, query: LifecycleQuery) -> Result<Vec<LifecycleEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| query.matches(e))
            .map(|e| state.with_notifications(e))
            .collect();

        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.sequence.cmp(&b.sequence))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(events.into_iter().skip(offset).take(limit).collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        let events: Vec<_> = state
            .events
            .iter()
            .map(|e| state.with_notifications(e))
            .collect();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn current_sequence(&self, order_id: OrderId) -> Result<Option<Sequence>> {
        Ok(self.state.read().await.heads.get(&order_id).copied())
    }

    async fn record_notification(
        &self,
        event_id: EventId,
        channel: NotificationChannel,
        outcome: NotificationOutcome,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.event_ids.contains(&event_id) {
            return Err(LifecycleLogError::EventNotFound(event_id));
        }
        state
            .notifications
            .entry(event_id)
            .or_default()
            .push((channel, outcome));
        Ok(())
    }
}
