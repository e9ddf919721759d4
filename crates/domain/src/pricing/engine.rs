//! The pricing function.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::{DeliveryConfig, PricingConfig, PricingError};

/// One priced line as seen by the pricing function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingLine {
    #[serde(rename = "total_price_cents")]
    pub total_price: Money,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceComponent {
    Subtotal,
    Tax,
    Delivery,
    PlatformFee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub component: PriceComponent,
    pub label: String,
    #[serde(rename = "amount_cents")]
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
}

/// Result of [`compute_pricing`].
///
/// `total_amount` is rounded once from the exact sum, so it may differ from
/// the sum of the rounded components by at most one minor unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    #[serde(rename = "subtotal_cents")]
    pub subtotal: Money,

    #[serde(rename = "tax_cents")]
    pub tax: Money,

    #[serde(rename = "delivery_charge_cents")]
    pub delivery_charge: Money,

    /// Absent when the platform fee rate is zero.
    #[serde(
        rename = "platform_fee_cents",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub platform_fee: Option<Money>,

    #[serde(rename = "total_amount_cents")]
    pub total_amount: Money,

    /// Advisory: `subtotal >= minimum_order_value`. Not enforced here.
    pub minimum_order_met: bool,

    pub breakdown: Vec<BreakdownLine>,
}

/// Prices a set of lines under a configuration.
///
/// Pure and deterministic: the same input always yields an identical
/// breakdown. All terms are computed exactly in minor units and rounded
/// half away from zero only when producing the output amounts.
pub fn compute_pricing(
    lines: &[PricingLine],
    config: &PricingConfig,
) -> Result<PriceBreakdown, PricingError> {
    let subtotal = lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.total_price))
        .ok_or(PricingError::AmountOverflow)?;
    let exact_subtotal = subtotal.to_decimal();

    let exact_tax = exact_subtotal
        .checked_mul(config.tax_rate)
        .ok_or(PricingError::AmountOverflow)?;

    let delivery = delivery_charge(subtotal, &config.delivery)?;

    let exact_fee = if config.platform_fee_rate.is_zero() {
        None
    } else {
        Some(
            exact_subtotal
                .checked_mul(config.platform_fee_rate)
                .ok_or(PricingError::AmountOverflow)?,
        )
    };

    let exact_total = [exact_tax, delivery.to_decimal(), exact_fee.unwrap_or_default()]
        .into_iter()
        .try_fold(exact_subtotal, |acc, term| acc.checked_add(term))
        .ok_or(PricingError::AmountOverflow)?;

    let tax = round(exact_tax)?;
    let platform_fee = exact_fee.map(round).transpose()?;
    let total_amount = round(exact_total)?;

    let mut breakdown = vec![
        BreakdownLine {
            component: PriceComponent::Subtotal,
            label: "Subtotal".to_string(),
            amount: subtotal,
            rate: None,
        },
        BreakdownLine {
            component: PriceComponent::Tax,
            label: "Tax".to_string(),
            amount: tax,
            rate: Some(config.tax_rate),
        },
        BreakdownLine {
            component: PriceComponent::Delivery,
            label: format!("Delivery ({})", config.delivery.mode()),
            amount: delivery,
            rate: None,
        },
    ];
    if let Some(fee) = platform_fee {
        breakdown.push(BreakdownLine {
            component: PriceComponent::PlatformFee,
            label: "Platform fee".to_string(),
            amount: fee,
            rate: Some(config.platform_fee_rate),
        });
    }

    Ok(PriceBreakdown {
        subtotal,
        tax,
        delivery_charge: delivery,
        platform_fee,
        total_amount,
        minimum_order_met: subtotal >= config.minimum_order_value,
        breakdown,
    })
}

fn delivery_charge(subtotal: Money, delivery: &DeliveryConfig) -> Result<Money, PricingError> {
    match delivery {
        DeliveryConfig::Fixed { charge } => Ok(*charge),
        DeliveryConfig::Threshold {
            free_above,
            charge_below,
        } => {
            if subtotal >= *free_above {
                Ok(Money::zero())
            } else {
                Ok(*charge_below)
            }
        }
        DeliveryConfig::Distance(_) | DeliveryConfig::Weight(_) => {
            Err(PricingError::UnsupportedDeliveryMode(delivery.mode()))
        }
    }
}

fn round(exact: Decimal) -> Result<Money, PricingError> {
    Money::from_decimal_rounded(exact).ok_or(PricingError::AmountOverflow)
}
