//! HTTP route handlers.

pub mod items;
pub mod merchants;
pub mod orders;
pub mod pricing;
pub mod system;
