use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Actor, ItemId, NotificationChannel, NotificationRecord, OrderId};

/// Unique identifier for a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Position of an event within its order's history.
///
/// Sequence 0 means "no events yet"; the first event of an order is 1 and
/// each subsequent event increments by one. Appends state the sequence they
/// expect to find, which is what serializes concurrent writers per order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    /// Creates a sequence from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the sequence of an order with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the sequence of an order's first event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next sequence.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw sequence value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Sequence {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The closed set of lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventType {
    OrderPlaced,
    ItemClaimed,
    ItemRejected,
    ItemStatusChanged,
    OrderStatusChanged,
    OrderCancelled,
}

impl LifecycleEventType {
    pub const ALL: [LifecycleEventType; 6] = [
        LifecycleEventType::OrderPlaced,
        LifecycleEventType::ItemClaimed,
        LifecycleEventType::ItemRejected,
        LifecycleEventType::ItemStatusChanged,
        LifecycleEventType::OrderStatusChanged,
        LifecycleEventType::OrderCancelled,
    ];

    /// Returns the stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventType::OrderPlaced => "order_placed",
            LifecycleEventType::ItemClaimed => "item_claimed",
            LifecycleEventType::ItemRejected => "item_rejected",
            LifecycleEventType::ItemStatusChanged => "item_status_changed",
            LifecycleEventType::OrderStatusChanged => "order_status_changed",
            LifecycleEventType::OrderCancelled => "order_cancelled",
        }
    }

    /// Parses a wire name. Unknown names are rejected rather than coerced.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for LifecycleEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable audit record of one state change or assignment decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: EventId,

    pub order_id: OrderId,

    /// None for order-wide events.
    pub item_id: Option<ItemId>,

    /// Position in the order's history.
    pub sequence: Sequence,

    pub event_type: LifecycleEventType,

    pub timestamp: DateTime<Utc>,

    pub triggered_by: Actor,

    /// The domain event as JSON.
    pub payload: serde_json::Value,

    /// Freeform context supplied by the caller (claim mode, reasons, ...).
    pub metadata: HashMap<String, serde_json::Value>,

    /// Latest notification attempt per channel. Filled in on read from the
    /// notification ledger; never written as part of the event itself.
    #[serde(default)]
    pub notifications: BTreeMap<NotificationChannel, NotificationRecord>,
}

impl LifecycleEvent {
    /// Creates a new event builder.
    pub fn builder() -> LifecycleEventBuilder {
        LifecycleEventBuilder::default()
    }
}

/// Builder for lifecycle events.
#[derive(Debug, Default)]
pub struct LifecycleEventBuilder {
    event_id: Option<EventId>,
    order_id: Option<OrderId>,
    item_id: Option<ItemId>,
    sequence: Option<Sequence>,
    event_type: Option<LifecycleEventType>,
    timestamp: Option<DateTime<Utc>>,
    triggered_by: Option<Actor>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl LifecycleEventBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn order_id(mut self, id: OrderId) -> Self {
        self.order_id = Some(id);
        self
    }

    pub fn item_id(mut self, id: Option<ItemId>) -> Self {
        self.item_id = id;
        self
    }

    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn event_type(mut self, event_type: LifecycleEventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn triggered_by(mut self, actor: Actor) -> Self {
        self.triggered_by = Some(actor);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Merges a whole metadata map, later keys winning.
    pub fn extend_metadata(
        mut self,
        entries: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) -> Self {
        self.metadata.extend(entries);
        self
    }

    /// Builds the event, returning None if a required field is missing.
    ///
    /// Required: order_id, sequence, event_type, triggered_by, payload.
    pub fn try_build(self) -> Option<LifecycleEvent> {
        Some(LifecycleEvent {
            event_id: self.event_id.unwrap_or_default(),
            order_id: self.order_id?,
            item_id: self.item_id,
            sequence: self.sequence?,
            event_type: self.event_type?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            triggered_by: self.triggered_by?,
            payload: self.payload?,
            metadata: self.metadata,
            notifications: BTreeMap::new(),
        })
    }
}
