//! Domain error types.

use common::OrderId;
use lifecycle_log::LifecycleLogError;
use thiserror::Error;

use crate::assignment::DirectoryError;
use crate::item::ItemError;
use crate::order::OrderError;
use crate::pricing::PricingError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Lifecycle log error: {0}")]
    Store(#[from] LifecycleLogError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("{0}")]
    Pricing(#[from] PricingError),

    #[error("{0}")]
    Directory(#[from] DirectoryError),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order kept changing underneath the command.
    #[error("Order {order_id} was modified concurrently; gave up after {attempts} attempts")]
    ConcurrentModification { order_id: OrderId, attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationError,
    AlreadyAssigned,
    ConcurrentModification,
    InvalidTransition,
    Forbidden,
    NoEligibleMerchant,
    NotFound,
    UnsupportedDeliveryMode,
    DirectoryUnavailable,
    StoreFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::AlreadyAssigned => "ALREADY_ASSIGNED",
            ErrorCode::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NoEligibleMerchant => "NO_ELIGIBLE_MERCHANT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::UnsupportedDeliveryMode => "UNSUPPORTED_DELIVERY_MODE",
            ErrorCode::DirectoryUnavailable => "DIRECTORY_UNAVAILABLE",
            ErrorCode::StoreFailure => "STORE_FAILURE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl DomainError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::Order(err) => err.code(),
            DomainError::Pricing(PricingError::UnsupportedDeliveryMode(_)) => {
                ErrorCode::UnsupportedDeliveryMode
            }
            DomainError::Pricing(PricingError::SettingsUnavailable(_)) => ErrorCode::StoreFailure,
            DomainError::Pricing(_) => ErrorCode::ValidationError,
            DomainError::Directory(_) => ErrorCode::DirectoryUnavailable,
            DomainError::OrderNotFound(_) => ErrorCode::NotFound,
            DomainError::ConcurrentModification { .. }
            | DomainError::Store(LifecycleLogError::ConcurrencyConflict { .. }) => {
                ErrorCode::ConcurrentModification
            }
            DomainError::Store(_) | DomainError::Serialization(_) => ErrorCode::StoreFailure,
        }
    }
}

impl From<ItemError> for DomainError {
    fn from(e: ItemError) -> Self {
        DomainError::Order(OrderError::Item(e))
    }
}
