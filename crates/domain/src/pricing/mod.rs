//! Pricing Engine: line items plus configuration to a price breakdown.

mod config;
mod engine;
mod settings;

pub use config::{DeliveryConfig, PricingConfig};
pub use engine::{BreakdownLine, PriceBreakdown, PriceComponent, PricingLine, compute_pricing};
pub use settings::{InMemorySettings, SettingsProvider};

use thiserror::Error;

/// Errors that can occur while pricing.
#[derive(Debug, Error)]
pub enum PricingError {
    /// A reserved delivery variant was configured.
    #[error("Unsupported delivery mode: {0}")]
    UnsupportedDeliveryMode(&'static str),

    #[error("Invalid pricing config: {0}")]
    InvalidConfig(String),

    #[error("Amount overflow while pricing")]
    AmountOverflow,

    /// The settings source could not be read.
    #[error("Settings unavailable: {0}")]
    SettingsUnavailable(String),
}
