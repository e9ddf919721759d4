//! Order aggregate, Order Status Aggregator and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use commands::{CancelOrder, NewOrderItem, PlaceOrder, UpdateItemStatus};
pub use events::{
    ClaimMode, ItemClaimedData, ItemRejectedData, ItemStatusChangedData, OrderCancelledData,
    OrderEvent, OrderPlacedData, OrderStatusChangedData,
};
pub use service::{LifecycleFilter, OrderService};
pub use status::{OrderStatus, aggregate_status};
pub use value_objects::{
    CustomerId, DeliveryAddress, OrderNumber, PaymentMethod, PaymentStatus, ProductId,
    StatusHistoryEntry,
};

use common::{ItemId, MerchantId};
use thiserror::Error;

use crate::error::ErrorCode;
use crate::item::ItemError;
use crate::money::Money;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Item(#[from] ItemError),

    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: ItemId },

    /// Lost a claim race, or the item was claimed earlier.
    #[error("Item {item_id} is already assigned to {merchant_id}")]
    AlreadyAssigned {
        item_id: ItemId,
        merchant_id: MerchantId,
    },

    #[error("No eligible merchant for item {item_id}")]
    NoEligibleMerchant { item_id: ItemId },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity for {product_id}: must be greater than 0")]
    InvalidQuantity { product_id: ProductId },

    #[error("Invalid price for {product_id}: {price} (must be greater than 0)")]
    InvalidPrice { product_id: ProductId, price: Money },

    #[error("Line total overflows for {product_id}")]
    AmountOverflow { product_id: ProductId },

    #[error("Order subtotal {subtotal} is below the minimum order value {minimum}")]
    BelowMinimumOrder { subtotal: Money, minimum: Money },

    /// A second checkout for an order id that is already in the log.
    #[error("Order already placed")]
    AlreadyPlaced,

    /// Whole-order cancellation with nothing left to cancel.
    #[error("Invalid transition: order has no active items to cancel")]
    NothingToCancel,
}

impl OrderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::Item(ItemError::Forbidden { .. }) | OrderError::Forbidden(_) => {
                ErrorCode::Forbidden
            }
            OrderError::Item(_) | OrderError::NothingToCancel => ErrorCode::InvalidTransition,
            OrderError::ItemNotFound { .. } => ErrorCode::NotFound,
            OrderError::AlreadyAssigned { .. } => ErrorCode::AlreadyAssigned,
            OrderError::NoEligibleMerchant { .. } => ErrorCode::NoEligibleMerchant,
            OrderError::NoItems
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::AmountOverflow { .. }
            | OrderError::BelowMinimumOrder { .. } => ErrorCode::ValidationError,
            OrderError::AlreadyPlaced => ErrorCode::ConcurrentModification,
        }
    }
}
