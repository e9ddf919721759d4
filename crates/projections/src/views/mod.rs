//! Read models served to merchants.

mod merchant_assignments;
mod open_items;

pub use merchant_assignments::{Assignment, MerchantAssignmentsView};
pub use open_items::{OpenItem, OpenItemsView};
