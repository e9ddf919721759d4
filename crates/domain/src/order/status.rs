//! Order-level status and its derivation from item statuses.

use serde::{Deserialize, Serialize};

use crate::item::ItemStatus;

/// Aggregate status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Delivered,
    PartiallyFulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::PartiallyFulfilled | OrderStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Delivered => "delivered",
            OrderStatus::PartiallyFulfilled => "partially_fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derives the order status from its item statuses. First match wins:
///
/// 1. all cancelled → cancelled
/// 2. all delivered → delivered
/// 3. only cancelled and delivered → partially fulfilled
/// 4. any pending → pending
/// 5. otherwise → processing
///
/// An order without items is pending.
pub fn aggregate_status<I>(statuses: I) -> OrderStatus
where
    I: IntoIterator<Item = ItemStatus>,
{
    let mut total = 0usize;
    let mut cancelled = 0usize;
    let mut delivered = 0usize;
    let mut pending = 0usize;

    for status in statuses {
        total += 1;
        match status {
            ItemStatus::Cancelled => cancelled += 1,
            ItemStatus::Delivered => delivered += 1,
            ItemStatus::Pending => pending += 1,
            ItemStatus::Assigned | ItemStatus::Processing | ItemStatus::Shipped => {}
        }
    }

    if total == 0 {
        OrderStatus::Pending
    } else if cancelled == total {
        OrderStatus::Cancelled
    } else if delivered == total {
        OrderStatus::Delivered
    } else if cancelled > 0 && cancelled + delivered == total {
        OrderStatus::PartiallyFulfilled
    } else if pending > 0 {
        OrderStatus::Pending
    } else {
        OrderStatus::Processing
    }
}
