//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Actor, ActorRole, ItemId, MerchantId, OrderId};
use lifecycle_log::Sequence;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::item::{ItemError, ItemEvent, ItemEventKind, ItemStatus, OrderItem};
use crate::money::Money;
use crate::pricing::{PriceBreakdown, PricingLine};

use super::{
    ClaimMode, CustomerId, DeliveryAddress, OrderCancelledData, OrderError, OrderEvent,
    OrderNumber, OrderPlacedData, OrderStatus, PaymentMethod, PaymentStatus, PlaceOrder,
    StatusHistoryEntry, aggregate_status,
};

/// Order aggregate root.
///
/// Rebuilt from the order's lifecycle events. Items keep their checkout
/// order; only their status, owner and exclusion set change afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,

    #[serde(default)]
    sequence: Sequence,

    order_number: Option<OrderNumber>,

    customer_id: Option<CustomerId>,

    items: Vec<OrderItem>,

    status: OrderStatus,

    pricing: Option<PriceBreakdown>,

    payment_method: Option<PaymentMethod>,

    payment_status: PaymentStatus,

    delivery_address: DeliveryAddress,

    created_at: Option<DateTime<Utc>>,

    status_history: Vec<StatusHistoryEntry>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

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
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::ItemClaimed(data) => {
                if let Some(item) = self.item_mut(data.item_id) {
                    item.status = ItemStatus::Assigned;
                    item.assigned_merchant_id = Some(data.merchant_id);
                    item.claimed_at = Some(data.claimed_at);
                }
            }
            OrderEvent::ItemRejected(data) => {
                if let Some(item) = self.item_mut(data.item_id) {
                    item.rejected_by.insert(data.merchant_id);
                }
            }
            OrderEvent::ItemStatusChanged(data) => {
                if let Some(item) = self.item_mut(data.item_id) {
                    item.status = data.to_status;
                }
            }
            OrderEvent::OrderStatusChanged(data) => {
                self.set_status(data.to_status, data.changed_at, None);
            }
            OrderEvent::OrderCancelled(data) => self.apply_order_cancelled(data),
        }
    }
}

// Query methods
impl Order {
    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Items in checkout order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, item_id: ItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn pricing(&self) -> Option<&PriceBreakdown> {
        self.pricing.as_ref()
    }

    pub fn total_amount(&self) -> Money {
        self.pricing
            .as_ref()
            .map(|p| p.total_amount)
            .unwrap_or_default()
    }

    pub fn payment_method(&self) -> Option<&PaymentMethod> {
        self.payment_method.as_ref()
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn delivery_address(&self) -> &DeliveryAddress {
        &self.delivery_address
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn status_history(&self) -> &[StatusHistoryEntry] {
        &self.status_history
    }

    pub fn is_placed(&self) -> bool {
        self.id.is_some()
    }

    fn find_item(&self, item_id: ItemId) -> Result<&OrderItem, OrderError> {
        self.item(item_id)
            .ok_or(OrderError::ItemNotFound { item_id })
    }

    /// The item, if a claim on it could still succeed.
    ///
    /// A non-pending item that already has an owner yields `AlreadyAssigned`
    /// so a caller that lost a race can tell it apart from a bad request.
    pub fn claimable_item(&self, item_id: ItemId) -> Result<&OrderItem, OrderError> {
        let item = self.find_item(item_id)?;

        if item.status == ItemStatus::Pending {
            return Ok(item);
        }
        match &item.assigned_merchant_id {
            Some(owner) => Err(OrderError::AlreadyAssigned {
                item_id,
                merchant_id: owner.clone(),
            }),
            None => Err(ItemError::InvalidTransition {
                from: item.status,
                event: ItemEventKind::Claim,
            }
            .into()),
        }
    }

    /// Order status change caused by replacing one item with `updated`.
    fn status_change_after(&self, updated: &OrderItem, at: DateTime<Utc>) -> Option<OrderEvent> {
        let next = aggregate_status(self.items.iter().map(|item| {
            if item.id == updated.id {
                updated.status
            } else {
                item.status
            }
        }));

        (next != self.status).then(|| OrderEvent::order_status_changed(self.status, next, at))
    }
}

// Command methods (return events)
impl Order {
    /// Validates checkout lines and turns them into pending items with fresh
    /// ids.
    pub fn build_items(cmd: &PlaceOrder) -> Result<Vec<OrderItem>, OrderError> {
        if cmd.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        cmd.items
            .iter()
            .map(|line| {
                if line.quantity == 0 {
                    return Err(OrderError::InvalidQuantity {
                        product_id: line.product_id.clone(),
                    });
                }
                if !line.unit_price.is_positive() {
                    return Err(OrderError::InvalidPrice {
                        product_id: line.product_id.clone(),
                        price: line.unit_price,
                    });
                }
                OrderItem::new(
                    ItemId::new(),
                    line.product_id.clone(),
                    line.product_name.clone(),
                    line.unit_price,
                    line.quantity,
                    line.weight_kg,
                )
                .ok_or_else(|| OrderError::AmountOverflow {
                    product_id: line.product_id.clone(),
                })
            })
            .collect()
    }

    /// The pricing input for a set of items.
    pub fn pricing_lines(items: &[OrderItem]) -> Vec<PricingLine> {
        items
            .iter()
            .map(|item| PricingLine {
                total_price: item.total_price,
                quantity: item.quantity,
                weight_kg: item.weight_kg,
            })
            .collect()
    }

    /// Places the order. The minimum order value is enforced here, not by
    /// the pricing function.
    pub fn place(
        &self,
        cmd: &PlaceOrder,
        items: &[OrderItem],
        pricing: &PriceBreakdown,
        minimum_order_value: Money,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if !pricing.minimum_order_met {
            return Err(OrderError::BelowMinimumOrder {
                subtotal: pricing.subtotal,
                minimum: minimum_order_value,
            });
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: cmd.order_id,
            order_number: OrderNumber::generate(cmd.order_id, at.date_naive()),
            customer_id: cmd.customer_id,
            items: items.to_vec(),
            pricing: pricing.clone(),
            payment_method: cmd.payment_method.clone(),
            payment_status: cmd.payment_method.initial_status(),
            delivery_address: cmd.delivery_address.clone(),
            placed_at: at,
        })])
    }

    /// Makes `merchant_id` the owner of a pending item.
    pub fn claim_item(
        &self,
        item_id: ItemId,
        merchant_id: &MerchantId,
        mode: ClaimMode,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let item = self.claimable_item(item_id)?;

        let claimed = item.apply_transition(
            &ItemEvent::Claim {
                merchant_id: merchant_id.clone(),
            },
            actor,
            at,
        )?;

        let mut events = vec![OrderEvent::item_claimed(
            item_id,
            merchant_id.clone(),
            mode,
            at,
        )];
        events.extend(self.status_change_after(&claimed, at));
        Ok(events)
    }

    /// Adds `merchant_id` to the item's exclusion set.
    ///
    /// Rejecting an item that is no longer pending, or rejecting twice, is a
    /// no-op.
    pub fn reject_item(
        &self,
        item_id: ItemId,
        merchant_id: &MerchantId,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let item = self.find_item(item_id)?;

        if !actor.is_merchant(merchant_id) && !actor.is_administrative() {
            return Err(OrderError::Forbidden(format!(
                "{actor} may not reject on behalf of {merchant_id}"
            )));
        }

        if item.status != ItemStatus::Pending || item.is_excluded(merchant_id) {
            return Ok(vec![]);
        }

        item.apply_transition(
            &ItemEvent::Reject {
                merchant_id: merchant_id.clone(),
            },
            actor,
            at,
        )?;

        Ok(vec![OrderEvent::item_rejected(
            item_id,
            merchant_id.clone(),
            at,
        )])
    }

    /// Moves an item to `target` through the state machine.
    pub fn update_item_status(
        &self,
        item_id: ItemId,
        target: ItemStatus,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let item = self.find_item(item_id)?;

        let event = ItemEvent::for_target(target).ok_or(ItemError::UnreachableStatus {
            from: item.status,
            to: target,
        })?;
        let updated = item.apply_transition(&event, actor, at)?;

        let mut events = vec![OrderEvent::item_status_changed(
            item_id,
            item.status,
            updated.status,
            at,
        )];
        events.extend(self.status_change_after(&updated, at));
        Ok(events)
    }

    /// Cancels every non-terminal item and the order itself.
    pub fn cancel(
        &self,
        reason: Option<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !matches!(actor.actor_role, ActorRole::Admin | ActorRole::Owner) {
            return Err(OrderError::Forbidden(format!(
                "{actor} may not cancel orders"
            )));
        }

        let cancelled_items: Vec<ItemId> = self
            .items
            .iter()
            .filter(|item| !item.status.is_terminal())
            .map(|item| item.id)
            .collect();

        if cancelled_items.is_empty() {
            return Err(OrderError::NothingToCancel);
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelledData {
            reason,
            cancelled_items,
            previous_status: self.status,
            cancelled_at: at,
        })])
    }
}

// Event application helpers
impl Order {
    fn item_mut(&mut self, item_id: ItemId) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    fn set_status(&mut self, status: OrderStatus, at: DateTime<Utc>, note: Option<String>) {
        self.status = status;
        self.status_history
            .push(StatusHistoryEntry { status, at, note });
    }

    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.order_number = Some(data.order_number);
        self.customer_id = Some(data.customer_id);
        self.items = data.items;
        self.pricing = Some(data.pricing);
        self.payment_method = Some(data.payment_method);
        self.payment_status = data.payment_status;
        self.delivery_address = data.delivery_address;
        self.created_at = Some(data.placed_at);
        self.status_history.clear();
        self.set_status(
            OrderStatus::Pending,
            data.placed_at,
            Some("order placed".to_string()),
        );
    }

    fn apply_order_cancelled(&mut self, data: OrderCancelledData) {
        for item_id in &data.cancelled_items {
            if let Some(item) = self.item_mut(*item_id) {
                item.status = ItemStatus::Cancelled;
            }
        }
        self.set_status(OrderStatus::Cancelled, data.cancelled_at, data.reason);
    }
}
