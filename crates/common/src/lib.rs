//! Identifiers and actor types shared by every crate in the workspace.

pub mod actor;
pub mod types;

pub use actor::{Actor, ActorRole};
pub use types::{ItemId, MerchantId, OrderId};
