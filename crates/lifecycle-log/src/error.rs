use thiserror::Error;

use crate::{EventId, OrderId, Sequence};

/// Errors that can occur when interacting with the lifecycle log.
#[derive(Debug, Error)]
pub enum LifecycleLogError {
    /// The order's sequence moved since it was read; nothing was written.
    #[error(
        "Concurrency conflict for order {order_id}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Sequence,
        actual: Sequence,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A notification outcome referenced an event that does not exist.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be mapped back into the log's types.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

/// Result type for lifecycle log operations.
pub type Result<T> = std::result::Result<T, LifecycleLogError>;
