//! Lifecycle event log.
//!
//! Every state change of an order is stored here as an immutable, per-order
//! sequenced [`LifecycleEvent`]. Appends are conditional on the order's
//! current sequence, which makes the log both the audit trail and the
//! compare-and-set guard for concurrent writers.

pub mod error;
pub mod event;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{Actor, ActorRole, ItemId, OrderId};
pub use error::{LifecycleLogError, Result};
pub use event::{EventId, LifecycleEvent, LifecycleEventBuilder, LifecycleEventType, Sequence};
pub use memory::InMemoryLifecycleStore;
pub use notification::{NotificationChannel, NotificationOutcome, NotificationRecord};
pub use postgres::PostgresLifecycleStore;
pub use query::LifecycleQuery;
pub use store::{AppendOptions, EventStream, LifecycleStore, LifecycleStoreExt};
