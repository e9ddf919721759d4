//! Projection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Lifecycle log error: {0}")]
    Store(#[from] lifecycle_log::LifecycleLogError),

    /// A lifecycle payload did not decode as an order event.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Projection error: {0}")]
    Projection(String),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
