//! Read models fed from the lifecycle log.
//!
//! - [`Projection`] folds lifecycle events into a read model
//! - [`ProjectionProcessor`] replays the log into registered projections
//! - Two views: the open-item pool and the merchant assignment board

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition, decode};
pub use views::{Assignment, MerchantAssignmentsView, OpenItem, OpenItemsView};
