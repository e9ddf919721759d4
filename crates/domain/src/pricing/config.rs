//! Pricing configuration as read from settings.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::PricingError;

/// How the delivery charge is computed.
///
/// The tag is closed: unknown `type` values fail to deserialize rather than
/// falling back to a default mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryConfig {
    /// Constant charge regardless of the order.
    Fixed {
        #[serde(rename = "charge_cents")]
        charge: Money,
    },

    /// Free delivery at or above `free_above`, otherwise `charge_below`.
    Threshold {
        #[serde(rename = "free_above_cents")]
        free_above: Money,
        #[serde(rename = "charge_below_cents")]
        charge_below: Money,
    },

    /// Reserved. Parameters are kept but not interpreted.
    Distance(BTreeMap<String, serde_json::Value>),

    /// Reserved. Parameters are kept but not interpreted.
    Weight(BTreeMap<String, serde_json::Value>),
}

impl DeliveryConfig {
    pub fn mode(&self) -> &'static str {
        match self {
            DeliveryConfig::Fixed { .. } => "fixed",
            DeliveryConfig::Threshold { .. } => "threshold",
            DeliveryConfig::Distance(_) => "distance",
            DeliveryConfig::Weight(_) => "weight",
        }
    }
}

/// Tax, delivery, platform fee and minimum-order settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Fraction of the subtotal, e.g. 0.18.
    pub tax_rate: Decimal,

    pub delivery: DeliveryConfig,

    /// Fraction of the subtotal; zero disables the fee entirely.
    #[serde(default)]
    pub platform_fee_rate: Decimal,

    #[serde(rename = "minimum_order_value_cents", default)]
    pub minimum_order_value: Money,
}

impl PricingConfig {
    /// Checks rates are fractions in [0, 1] and amounts are not negative.
    pub fn validate(&self) -> Result<(), PricingError> {
        check_rate("tax_rate", self.tax_rate)?;
        check_rate("platform_fee_rate", self.platform_fee_rate)?;

        if self.minimum_order_value.is_negative() {
            return Err(PricingError::InvalidConfig(
                "minimum_order_value_cents must not be negative".to_string(),
            ));
        }

        match &self.delivery {
            DeliveryConfig::Fixed { charge } if charge.is_negative() => Err(
                PricingError::InvalidConfig("charge_cents must not be negative".to_string()),
            ),
            DeliveryConfig::Threshold {
                free_above,
                charge_below,
            } if free_above.is_negative() || charge_below.is_negative() => {
                Err(PricingError::InvalidConfig(
                    "threshold amounts must not be negative".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

fn check_rate(name: &str, rate: Decimal) -> Result<(), PricingError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(PricingError::InvalidConfig(format!(
            "{name} must be between 0 and 1, got {rate}"
        )));
    }
    Ok(())
}

impl Default for PricingConfig {
    /// 18% tax, free delivery from 1000.00, otherwise 100.00, no platform
    /// fee, no minimum.
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            delivery: DeliveryConfig::Threshold {
                free_above: Money::from_major(1000),
                charge_below: Money::from_major(100),
            },
            platform_fee_rate: Decimal::ZERO,
            minimum_order_value: Money::zero(),
        }
    }
}
