//! Assignment Engine: manual claims, auto-assignment and rejections.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, ItemId, MerchantId, OrderId};
use lifecycle_log::LifecycleStore;
use rust_decimal::Decimal;

use crate::command::{CommandHandler, CommandResult, ExecutionContext};
use crate::error::DomainError;
use crate::item::ItemStatus;
use crate::order::{ClaimMode, Order, OrderError, ProductId};

use super::{MerchantCandidate, MerchantDirectory, rank_candidates, sort_candidates};

/// Default radius within which a merchant may serve a customer.
pub const DEFAULT_MAX_DELIVERY_DISTANCE_KM: i64 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPolicy {
    pub max_delivery_distance_km: Decimal,
}

impl Default for AssignmentPolicy {
    fn default() -> Self {
        Self {
            max_delivery_distance_km: Decimal::from(DEFAULT_MAX_DELIVERY_DISTANCE_KM),
        }
    }
}

/// Arbitrates claims over order items.
///
/// Every claim goes through the command handler's conditional append, so of
/// any number of concurrent claims on one item exactly one commits; the rest
/// re-evaluate against the winner's state and get `AlreadyAssigned`.
pub struct AssignmentEngine<S: LifecycleStore> {
    handler: CommandHandler<S, Order>,
    directory: Arc<dyn MerchantDirectory>,
    policy: AssignmentPolicy,
}

impl<S: LifecycleStore> AssignmentEngine<S> {
    pub fn new(store: S, directory: Arc<dyn MerchantDirectory>) -> Self {
        Self::from_handler(CommandHandler::new(store), directory)
    }

    pub fn from_handler(handler: CommandHandler<S, Order>, directory: Arc<dyn MerchantDirectory>) -> Self {
        Self {
            handler,
            directory,
            policy: AssignmentPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AssignmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &AssignmentPolicy {
        &self.policy
    }

    /// Directory candidates for a product in ranking order, unfiltered.
    pub async fn candidates_for(
        &self,
        product_id: &ProductId,
        area: Option<&str>,
    ) -> Result<Vec<MerchantCandidate>, DomainError> {
        let mut candidates = self.directory.candidates(product_id, area).await?;
        sort_candidates(&mut candidates);
        Ok(candidates)
    }

    /// Manual claim of one item by `merchant_id`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn claim(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        merchant_id: MerchantId,
        actor: &Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let ctx = ExecutionContext::new(actor.clone())
            .with_metadata("mode", serde_json::json!(ClaimMode::Manual.as_str()));

        let result = self
            .handler
            .execute_existing(order_id, &ctx, |order| {
                order.claim_item(item_id, &merchant_id, ClaimMode::Manual, actor, Utc::now())
            })
            .await;

        record_claim_outcome(&result);
        result
    }

    /// Claims the item for the best eligible merchant.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn auto_assign(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        actor: &Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self.try_auto_assign(order_id, item_id, actor).await;
        record_claim_outcome(&result);
        result
    }

    /// The directory is asked once; ranking is redone against the state the
    /// claim is decided on. A pick that was rejected in the meantime makes
    /// the claim a no-op and the remaining candidates are ranked again.
    async fn try_auto_assign(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        actor: &Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let mut order = self
            .handler
            .load_existing(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        let item = order.claimable_item(item_id)?;

        let area = Some(order.delivery_address().area.as_str())
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let candidates = self
            .directory
            .candidates(&item.product_id, area.as_deref())
            .await?;

        loop {
            let item = order.claimable_item(item_id)?;
            let ranked = rank_candidates(
                candidates.clone(),
                item,
                self.policy.max_delivery_distance_km,
            );

            let Some(best) = ranked.first() else {
                tracing::info!(product_id = %item.product_id, area = ?area, "no eligible merchant");
                return Err(OrderError::NoEligibleMerchant { item_id }.into());
            };
            tracing::debug!(
                merchant_id = %best.merchant_id,
                candidates = ranked.len(),
                "auto-assign picked candidate"
            );

            let ctx = ExecutionContext::new(actor.clone())
                .with_metadata("mode", serde_json::json!(ClaimMode::Auto.as_str()))
                .with_metadata("candidate_count", serde_json::json!(ranked.len()))
                .with_metadata("effective_price_cents", serde_json::json!(best.effective_price))
                .with_metadata("distance_km", serde_json::json!(best.distance_km));

            let result = self
                .handler
                .execute_existing(order_id, &ctx, |current| {
                    let rejected_since = current.item(item_id).is_some_and(|i| {
                        i.status == ItemStatus::Pending && i.is_excluded(&best.merchant_id)
                    });
                    if rejected_since {
                        return Ok(Vec::new());
                    }
                    current.claim_item(item_id, &best.merchant_id, ClaimMode::Auto, actor, Utc::now())
                })
                .await?;

            if !result.events.is_empty() {
                return Ok(result);
            }
            tracing::debug!(merchant_id = %best.merchant_id, "pick was rejected meanwhile, re-ranking");
            order = result.aggregate;
        }
    }

    /// Excludes `merchant_id` from the item. A no-op once the item has left
    /// `pending`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn reject(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        merchant_id: MerchantId,
        actor: &Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let ctx = ExecutionContext::new(actor.clone());

        let result = self
            .handler
            .execute_existing(order_id, &ctx, |order| {
                order.reject_item(item_id, &merchant_id, actor, Utc::now())
            })
            .await;

        let outcome = match &result {
            Ok(r) if r.events.is_empty() => "noop".to_string(),
            Ok(_) => "rejected".to_string(),
            Err(e) => e.code().as_str().to_ascii_lowercase(),
        };
        metrics::counter!("item_rejections_total", "outcome" => outcome).increment(1);
        result
    }
}

fn record_claim_outcome(result: &Result<CommandResult<Order>, DomainError>) {
    let outcome = match result {
        Ok(_) => "claimed".to_string(),
        Err(e) => e.code().as_str().to_ascii_lowercase(),
    };
    metrics::counter!("item_claims_total", "outcome" => outcome).increment(1);
}
