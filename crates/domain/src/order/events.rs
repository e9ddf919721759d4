//! Order domain events.
//!
//! Each variant maps to one lifecycle event type; the serialized event is
//! the lifecycle event payload.

use chrono::{DateTime, Utc};
use common::{ItemId, MerchantId, OrderId};
use lifecycle_log::LifecycleEventType;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::item::{ItemStatus, OrderItem};
use crate::pricing::PriceBreakdown;

use super::{CustomerId, DeliveryAddress, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus};

/// Events that can occur on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),
    ItemClaimed(ItemClaimedData),
    ItemRejected(ItemRejectedData),
    ItemStatusChanged(ItemStatusChangedData),
    OrderStatusChanged(OrderStatusChangedData),
    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> LifecycleEventType {
        match self {
            OrderEvent::OrderPlaced(_) => LifecycleEventType::OrderPlaced,
            OrderEvent::ItemClaimed(_) => LifecycleEventType::ItemClaimed,
            OrderEvent::ItemRejected(_) => LifecycleEventType::ItemRejected,
            OrderEvent::ItemStatusChanged(_) => LifecycleEventType::ItemStatusChanged,
            OrderEvent::OrderStatusChanged(_) => LifecycleEventType::OrderStatusChanged,
            OrderEvent::OrderCancelled(_) => LifecycleEventType::OrderCancelled,
        }
    }

    fn item_id(&self) -> Option<ItemId> {
        match self {
            OrderEvent::ItemClaimed(data) => Some(data.item_id),
            OrderEvent::ItemRejected(data) => Some(data.item_id),
            OrderEvent::ItemStatusChanged(data) => Some(data.item_id),
            OrderEvent::OrderPlaced(_)
            | OrderEvent::OrderStatusChanged(_)
            | OrderEvent::OrderCancelled(_) => None,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(data) => data.placed_at,
            OrderEvent::ItemClaimed(data) => data.claimed_at,
            OrderEvent::ItemRejected(data) => data.rejected_at,
            OrderEvent::ItemStatusChanged(data) => data.changed_at,
            OrderEvent::OrderStatusChanged(data) => data.changed_at,
            OrderEvent::OrderCancelled(data) => data.cancelled_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub customer_id: CustomerId,
    /// Every item, all pending and unassigned.
    pub items: Vec<OrderItem>,
    pub pricing: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_address: DeliveryAddress,
    pub placed_at: DateTime<Utc>,
}

/// How a merchant came to own an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimMode {
    Manual,
    Auto,
}

impl ClaimMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimMode::Manual => "manual",
            ClaimMode::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemClaimedData {
    pub item_id: ItemId,
    pub merchant_id: MerchantId,
    pub mode: ClaimMode,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRejectedData {
    pub item_id: ItemId,
    pub merchant_id: MerchantId,
    pub rejected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatusChangedData {
    pub item_id: ItemId,
    pub from_status: ItemStatus,
    pub to_status: ItemStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Items forced to cancelled by this event.
    pub cancelled_items: Vec<ItemId>,
    pub previous_status: OrderStatus,
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors
impl OrderEvent {
    pub fn item_claimed(
        item_id: ItemId,
        merchant_id: MerchantId,
        mode: ClaimMode,
        at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::ItemClaimed(ItemClaimedData {
            item_id,
            merchant_id,
            mode,
            claimed_at: at,
        })
    }

    pub fn item_rejected(item_id: ItemId, merchant_id: MerchantId, at: DateTime<Utc>) -> Self {
        OrderEvent::ItemRejected(ItemRejectedData {
            item_id,
            merchant_id,
            rejected_at: at,
        })
    }

    pub fn item_status_changed(
        item_id: ItemId,
        from_status: ItemStatus,
        to_status: ItemStatus,
        at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::ItemStatusChanged(ItemStatusChangedData {
            item_id,
            from_status,
            to_status,
            changed_at: at,
        })
    }

    pub fn order_status_changed(
        from_status: OrderStatus,
        to_status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            from_status,
            to_status,
            changed_at: at,
        })
    }
}
