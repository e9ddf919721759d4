//! Item Lifecycle State Machine.

mod model;
mod state;

pub use model::{ItemEvent, OrderItem};
pub use state::{ItemEventKind, ItemStatus, TRANSITIONS, transition_target};

use thiserror::Error;

/// Errors from applying an event to a single item.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The (state, event) pair is not in the transition table.
    #[error("Invalid transition: cannot {event} an item that is {from}")]
    InvalidTransition {
        from: ItemStatus,
        event: ItemEventKind,
    },

    /// The target status cannot be requested directly.
    #[error("Invalid transition: {to} cannot be requested as a status update (item is {from})")]
    UnreachableStatus { from: ItemStatus, to: ItemStatus },

    /// The actor may not apply this event to this item.
    #[error("Forbidden: {actor} may not {event} this item: {reason}")]
    Forbidden {
        actor: String,
        event: ItemEventKind,
        reason: String,
    },
}
