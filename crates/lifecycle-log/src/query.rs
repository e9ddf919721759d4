use chrono::{DateTime, Utc};

use crate::{ItemId, LifecycleEvent, LifecycleEventType, OrderId, Sequence};

/// Filter over the lifecycle log.
///
/// Results are always ordered by timestamp, then sequence.
#[derive(Debug, Clone, Default)]
pub struct LifecycleQuery {
    pub order_id: Option<OrderId>,

    pub item_id: Option<ItemId>,

    /// Any of these types.
    pub event_types: Option<Vec<LifecycleEventType>>,

    pub actor_id: Option<String>,

    /// Inclusive.
    pub from_sequence: Option<Sequence>,

    /// Inclusive.
    pub to_sequence: Option<Sequence>,

    /// Inclusive.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Inclusive.
    pub to_timestamp: Option<DateTime<Utc>>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl LifecycleQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one order's events.
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    pub fn item_id(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn event_type(mut self, event_type: LifecycleEventType) -> Self {
        self.event_types = Some(vec![event_type]);
        self
    }

    pub fn event_types(mut self, event_types: Vec<LifecycleEventType>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn from_sequence(mut self, sequence: Sequence) -> Self {
        self.from_sequence = Some(sequence);
        self
    }

    pub fn to_sequence(mut self, sequence: Sequence) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the event passes every filter except limit/offset.
    pub fn matches(&self, event: &LifecycleEvent) -> bool {
        if let Some(id) = self.order_id
            && event.order_id != id
        {
            return false;
        }
        if let Some(id) = self.item_id
            && event.item_id != Some(id)
        {
            return false;
        }
        if let Some(ref types) = self.event_types
            && !types.contains(&event.event_type)
        {
            return false;
        }
        if let Some(ref actor_id) = self.actor_id
            && &event.triggered_by.actor_id != actor_id
        {
            return false;
        }
        if let Some(from) = self.from_sequence
            && event.sequence < from
        {
            return false;
        }
        if let Some(to) = self.to_sequence
            && event.sequence > to
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && event.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && event.timestamp > to
        {
            return false;
        }
        true
    }
}
