//! Order items and the guarded transition function.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{Actor, ActorRole, ItemId, MerchantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::order::ProductId;

use super::{ItemError, ItemEventKind, ItemStatus, transition_target};

/// An event applied to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    Claim { merchant_id: MerchantId },
    Reject { merchant_id: MerchantId },
    StartProcessing,
    Ship,
    Deliver,
    Cancel,
}

impl ItemEvent {
    pub fn kind(&self) -> ItemEventKind {
        match self {
            ItemEvent::Claim { .. } => ItemEventKind::Claim,
            ItemEvent::Reject { .. } => ItemEventKind::Reject,
            ItemEvent::StartProcessing => ItemEventKind::StartProcessing,
            ItemEvent::Ship => ItemEventKind::Ship,
            ItemEvent::Deliver => ItemEventKind::Deliver,
            ItemEvent::Cancel => ItemEventKind::Cancel,
        }
    }

    /// The status-update event that moves an item to `target`.
    ///
    /// Pending and assigned are only reached through reject and claim, so
    /// they have no status-update event.
    pub fn for_target(target: ItemStatus) -> Option<ItemEvent> {
        match target {
            ItemStatus::Processing => Some(ItemEvent::StartProcessing),
            ItemStatus::Shipped => Some(ItemEvent::Ship),
            ItemStatus::Delivered => Some(ItemEvent::Deliver),
            ItemStatus::Cancelled => Some(ItemEvent::Cancel),
            ItemStatus::Pending | ItemStatus::Assigned => None,
        }
    }
}

/// One line of an order, independently assignable to a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: ItemId,
    pub product_id: ProductId,
    pub product_name: String,

    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,

    pub quantity: u32,

    /// unit_price × quantity, fixed at checkout.
    #[serde(rename = "total_price_cents")]
    pub total_price: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<Decimal>,

    /// Set exactly when the status is past pending, except for items
    /// cancelled with the whole order before anyone claimed them.
    pub assigned_merchant_id: Option<MerchantId>,

    pub status: ItemStatus,

    /// Merchants that rejected this item and may never claim it.
    #[serde(default)]
    pub rejected_by: BTreeSet<MerchantId>,

    pub claimed_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    /// Creates a pending, unassigned item. Returns None if the total
    /// overflows.
    pub fn new(
        id: ItemId,
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
        weight_kg: Option<Decimal>,
    ) -> Option<Self> {
        Some(Self {
            id,
            product_id: product_id.into(),
            product_name: product_name.into(),
            unit_price,
            quantity,
            total_price: unit_price.checked_mul(quantity)?,
            weight_kg,
            assigned_merchant_id: None,
            status: ItemStatus::Pending,
            rejected_by: BTreeSet::new(),
            claimed_at: None,
        })
    }

    pub fn is_excluded(&self, merchant_id: &MerchantId) -> bool {
        self.rejected_by.contains(merchant_id)
    }

    /// Validates `event` against the transition table, then against the
    /// actor, and returns the updated item. `self` is left untouched.
    pub fn apply_transition(
        &self,
        event: &ItemEvent,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<OrderItem, ItemError> {
        let kind = event.kind();
        let target = transition_target(self.status, kind).ok_or(ItemError::InvalidTransition {
            from: self.status,
            event: kind,
        })?;

        self.authorize(event, actor)?;

        let mut next = self.clone();
        next.status = target;
        match event {
            ItemEvent::Claim { merchant_id } => {
                next.assigned_merchant_id = Some(merchant_id.clone());
                next.claimed_at = Some(at);
            }
            ItemEvent::Reject { merchant_id } => {
                next.rejected_by.insert(merchant_id.clone());
            }
            ItemEvent::StartProcessing | ItemEvent::Ship | ItemEvent::Deliver | ItemEvent::Cancel => {}
        }
        Ok(next)
    }

    fn authorize(&self, event: &ItemEvent, actor: &Actor) -> Result<(), ItemError> {
        let forbidden = |reason: &str| ItemError::Forbidden {
            actor: actor.to_string(),
            event: event.kind(),
            reason: reason.to_string(),
        };

        match event {
            ItemEvent::Claim { merchant_id } => {
                if self.is_excluded(merchant_id) {
                    return Err(forbidden("merchant previously rejected this item"));
                }
                if !actor.is_merchant(merchant_id) && !actor.is_administrative() {
                    return Err(forbidden("only the claiming merchant or an administrator may claim"));
                }
            }
            ItemEvent::Reject { merchant_id } => {
                if !actor.is_merchant(merchant_id) && !actor.is_administrative() {
                    return Err(forbidden("only the rejecting merchant or an administrator may reject"));
                }
            }
            ItemEvent::StartProcessing | ItemEvent::Ship | ItemEvent::Deliver => {
                if !self.is_owned_by(actor) {
                    return Err(forbidden("only the assigned merchant may update this item"));
                }
            }
            ItemEvent::Cancel => {
                let admin_override =
                    matches!(actor.actor_role, ActorRole::Admin | ActorRole::Owner);
                if !self.is_owned_by(actor) && !admin_override {
                    return Err(forbidden("only the assigned merchant or an admin may cancel"));
                }
            }
        }
        Ok(())
    }

    fn is_owned_by(&self, actor: &Actor) -> bool {
        self.assigned_merchant_id
            .as_ref()
            .is_some_and(|owner| actor.is_merchant(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> OrderItem {
        OrderItem::new(
            ItemId::new(),
            "SKU-1",
            "Rice 5kg",
            Money::from_minor(25_000),
            2,
            None,
        )
        .unwrap()
    }

    fn m(id: &str) -> MerchantId {
        MerchantId::new(id)
    }

    fn claimed_by(merchant: &str) -> OrderItem {
        item()
            .apply_transition(
                &ItemEvent::Claim {
                    merchant_id: m(merchant),
                },
                &Actor::merchant(&m(merchant)),
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn new_item_is_pending_and_priced() {
        let item = item();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.total_price, Money::from_minor(50_000));
        assert!(item.assigned_merchant_id.is_none());
    }

    #[test]
    fn claim_assigns_merchant() {
        let claimed = claimed_by("m-1");
        assert_eq!(claimed.status, ItemStatus::Assigned);
        assert_eq!(claimed.assigned_merchant_id, Some(m("m-1")));
        assert!(claimed.claimed_at.is_some());
    }

    #[test]
    fn admin_may_claim_on_behalf() {
        let claimed = item()
            .apply_transition(
                &ItemEvent::Claim {
                    merchant_id: m("m-1"),
                },
                &Actor::admin("ops"),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(claimed.assigned_merchant_id, Some(m("m-1")));
    }

    #[test]
    fn merchant_cannot_claim_for_another() {
        let err = item()
            .apply_transition(
                &ItemEvent::Claim {
                    merchant_id: m("m-1"),
                },
                &Actor::merchant(&m("m-2")),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, ItemError::Forbidden { .. }));
    }

    #[test]
    fn excluded_merchant_cannot_claim() {
        let rejected = item()
            .apply_transition(
                &ItemEvent::Reject {
                    merchant_id: m("m-1"),
                },
                &Actor::merchant(&m("m-1")),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(rejected.status, ItemStatus::Pending);
        assert!(rejected.is_excluded(&m("m-1")));

        let err = rejected
            .apply_transition(
                &ItemEvent::Claim {
                    merchant_id: m("m-1"),
                },
                &Actor::admin("ops"),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, ItemError::Forbidden { .. }));
    }

    #[test]
    fn only_owner_advances() {
        let claimed = claimed_by("m-1");

        let err = claimed
            .apply_transition(&ItemEvent::StartProcessing, &Actor::merchant(&m("m-2")), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ItemError::Forbidden { .. }));

        let err = claimed
            .apply_transition(&ItemEvent::StartProcessing, &Actor::admin("ops"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ItemError::Forbidden { .. }));

        let processing = claimed
            .apply_transition(&ItemEvent::StartProcessing, &Actor::merchant(&m("m-1")), Utc::now())
            .unwrap();
        assert_eq!(processing.status, ItemStatus::Processing);
    }

    #[test]
    fn admin_may_cancel_but_system_may_not() {
        let claimed = claimed_by("m-1");

        let cancelled = claimed
            .apply_transition(&ItemEvent::Cancel, &Actor::admin("ops"), Utc::now())
            .unwrap();
        assert_eq!(cancelled.status, ItemStatus::Cancelled);

        let err = claimed
            .apply_transition(&ItemEvent::Cancel, &Actor::system(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ItemError::Forbidden { .. }));
    }

    #[test]
    fn table_is_checked_before_actor() {
        // A stranger attempting an impossible transition sees the state
        // error, not the authorization error.
        let err = item()
            .apply_transition(&ItemEvent::Ship, &Actor::customer("c-1"), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            ItemError::InvalidTransition {
                from: ItemStatus::Pending,
                event: ItemEventKind::Ship
            }
        ));
    }

    #[test]
    fn terminal_items_reject_every_event() {
        let owner = Actor::merchant(&m("m-1"));
        let delivered = claimed_by("m-1")
            .apply_transition(&ItemEvent::StartProcessing, &owner, Utc::now())
            .and_then(|i| i.apply_transition(&ItemEvent::Deliver, &owner, Utc::now()))
            .unwrap();
        assert_eq!(delivered.status, ItemStatus::Delivered);

        for event in [
            ItemEvent::Claim {
                merchant_id: m("m-1"),
            },
            ItemEvent::Reject {
                merchant_id: m("m-1"),
            },
            ItemEvent::StartProcessing,
            ItemEvent::Ship,
            ItemEvent::Deliver,
            ItemEvent::Cancel,
        ] {
            assert!(matches!(
                delivered.apply_transition(&event, &owner, Utc::now()),
                Err(ItemError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn for_target_maps_update_statuses() {
        assert_eq!(
            ItemEvent::for_target(ItemStatus::Shipped),
            Some(ItemEvent::Ship)
        );
        assert_eq!(ItemEvent::for_target(ItemStatus::Assigned), None);
        assert_eq!(ItemEvent::for_target(ItemStatus::Pending), None);
    }

    #[test]
    fn serializes_money_as_cents() {
        let json = serde_json::to_value(item()).unwrap();
        assert_eq!(json["unit_price_cents"], 25_000);
        assert_eq!(json["total_price_cents"], 50_000);
        assert_eq!(json["status"], "pending");
    }
}
