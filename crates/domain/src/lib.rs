//! Fulfillment domain.
//!
//! This crate provides:
//! - The pricing engine and its settings provider
//! - The item lifecycle state machine
//! - The event-sourced Order aggregate and order status aggregation
//! - Merchant assignment (manual claims, auto-assign, rejections)
//! - Command handling with conditional appends and notification dispatch

pub mod aggregate;
pub mod assignment;
pub mod command;
pub mod error;
pub mod item;
pub mod money;
pub mod notification;
pub mod order;
pub mod pricing;

pub use aggregate::{Aggregate, DomainEvent};
pub use assignment::{
    AssignmentEngine, AssignmentPolicy, DirectoryError, DirectoryListing,
    InMemoryMerchantDirectory, MerchantCandidate, MerchantDirectory, rank_candidates,
};
pub use command::{Command, CommandHandler, CommandResult, DEFAULT_RETRY_LIMIT, ExecutionContext};
pub use error::{DomainError, ErrorCode};
pub use item::{ItemError, ItemEvent, ItemEventKind, ItemStatus, OrderItem, transition_target};
pub use money::Money;
pub use notification::{
    InMemoryNotifier, LoggingNotifier, Notifier, NotifyError, SentNotification, channels_for,
};
pub use order::{
    CancelOrder, ClaimMode, CustomerId, DeliveryAddress, LifecycleFilter, NewOrderItem, Order,
    OrderError, OrderEvent, OrderNumber, OrderService, OrderStatus, PaymentMethod, PaymentStatus,
    PlaceOrder, ProductId, UpdateItemStatus, aggregate_status,
};
pub use pricing::{
    DeliveryConfig, InMemorySettings, PriceBreakdown, PricingConfig, PricingError, PricingLine,
    SettingsProvider, compute_pricing,
};
