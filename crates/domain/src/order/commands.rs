//! Order commands.

use common::{ItemId, OrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::item::ItemStatus;
use crate::money::Money;

use super::{CustomerId, DeliveryAddress, Order, PaymentMethod, ProductId};

/// A line of a checkout submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
}

impl NewOrderItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            unit_price,
            quantity,
            weight_kg: None,
        }
    }
}

/// Checkout: create an order with all its items at once.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub items: Vec<NewOrderItem>,
    pub payment_method: PaymentMethod,
    pub delivery_address: DeliveryAddress,
}

impl PlaceOrder {
    /// Creates a checkout command with a generated order id.
    pub fn new(
        customer_id: CustomerId,
        items: Vec<NewOrderItem>,
        payment_method: PaymentMethod,
        delivery_address: DeliveryAddress,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            customer_id,
            items,
            payment_method,
            delivery_address,
        }
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn order_id(&self) -> OrderId {
        self.order_id
    }
}

/// Move an item to a new status (processing, shipped, delivered, cancelled).
#[derive(Debug, Clone)]
pub struct UpdateItemStatus {
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub status: ItemStatus,
}

impl UpdateItemStatus {
    pub fn new(order_id: OrderId, item_id: ItemId, status: ItemStatus) -> Self {
        Self {
            order_id,
            item_id,
            status,
        }
    }
}

impl Command for UpdateItemStatus {
    type Aggregate = Order;

    fn order_id(&self) -> OrderId {
        self.order_id
    }
}

/// Administrative cancellation of a whole order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: Option<String>,
}

impl CancelOrder {
    pub fn new(order_id: OrderId, reason: Option<String>) -> Self {
        Self { order_id, reason }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn order_id(&self) -> OrderId {
        self.order_id
    }
}
