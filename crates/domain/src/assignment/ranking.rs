//! Candidate eligibility and ranking for auto-assignment.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::item::OrderItem;

use super::MerchantCandidate;

/// Total order over candidates: lowest effective price, then nearest, then
/// most stock, then merchant id.
pub fn compare_candidates(a: &MerchantCandidate, b: &MerchantCandidate) -> Ordering {
    a.effective_price
        .cmp(&b.effective_price)
        .then_with(|| a.distance_km.cmp(&b.distance_km))
        .then_with(|| b.available_stock.cmp(&a.available_stock))
        .then_with(|| a.merchant_id.cmp(&b.merchant_id))
}

pub fn sort_candidates(candidates: &mut [MerchantCandidate]) {
    candidates.sort_by(compare_candidates);
}

/// Candidates able to take `item`, best first.
///
/// A candidate qualifies with enough stock for the whole line, within
/// `max_distance_km`, and not in the item's exclusion set.
pub fn rank_candidates(
    candidates: Vec<MerchantCandidate>,
    item: &OrderItem,
    max_distance_km: Decimal,
) -> Vec<MerchantCandidate> {
    let mut eligible: Vec<MerchantCandidate> = candidates
        .into_iter()
        .filter(|c| c.available_stock >= item.quantity)
        .filter(|c| c.distance_km <= max_distance_km)
        .filter(|c| !item.is_excluded(&c.merchant_id))
        .collect();

    sort_candidates(&mut eligible);
    let mut seen = BTreeSet::new();
    eligible.retain(|c| seen.insert(c.merchant_id.clone()));
    eligible
}
