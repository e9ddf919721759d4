//! Projection trait and position tracking.

use async_trait::async_trait;
use domain::OrderEvent;
use lifecycle_log::LifecycleEvent;

use crate::Result;

/// How far into the global lifecycle log a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Folds lifecycle events into a read model.
///
/// Events arrive in global log order. A projection must advance its position
/// for every event it is handed, including ones it ignores.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &LifecycleEvent) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model back to an empty log.
    async fn reset(&self) -> Result<()>;
}

/// Decodes the order event a lifecycle record carries.
pub fn decode(event: &LifecycleEvent) -> Result<OrderEvent> {
    Ok(serde_json::from_value(event.payload.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_advances_from_zero() {
        let pos = ProjectionPosition::zero().advance().advance();
        assert_eq!(pos.events_processed, 2);
        assert!(pos > ProjectionPosition::zero());
        assert_eq!(pos.to_string(), "position(2)");
    }
}
