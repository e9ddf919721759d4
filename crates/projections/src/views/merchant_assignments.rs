//! Merchant assignment board: claimed items and where they stand.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, MerchantId, OrderId};
use domain::order::ClaimMode;
use domain::{ItemStatus, Money, OrderEvent, OrderNumber, ProductId};
use lifecycle_log::LifecycleEvent;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, decode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub item_id: ItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    #[serde(rename = "total_price_cents")]
    pub total_price: Money,
    pub status: ItemStatus,
    pub mode: ClaimMode,
    pub claimed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the board remembers about an item before anyone claims it.
#[derive(Debug, Clone)]
struct ItemInfo {
    order_id: OrderId,
    order_number: OrderNumber,
    product_id: ProductId,
    product_name: String,
    quantity: u32,
    total_price: Money,
}

#[derive(Debug, Default)]
struct BoardState {
    catalogue: HashMap<ItemId, ItemInfo>,
    owners: HashMap<ItemId, MerchantId>,
    assignments: HashMap<MerchantId, HashMap<ItemId, Assignment>>,
    position: ProjectionPosition,
}

impl BoardState {
    fn assignment_mut(&mut self, item_id: ItemId) -> Option<&mut Assignment> {
        let owner = self.owners.get(&item_id)?;
        self.assignments.get_mut(owner)?.get_mut(&item_id)
    }
}

/// Each merchant's claimed items with their current status.
#[derive(Debug, Clone, Default)]
pub struct MerchantAssignmentsView {
    state: Arc<RwLock<BoardState>>,
}

impl MerchantAssignmentsView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The merchant's assignments, most recently claimed first.
    pub async fn assignments_for(&self, merchant_id: &MerchantId) -> Vec<Assignment> {
        let state = self.state.read().await;
        let mut assignments: Vec<Assignment> = state
            .assignments
            .get(merchant_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default();
        assignments.sort_by(|a, b| {
            b.claimed_at
                .cmp(&a.claimed_at)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        assignments
    }

    /// Assignments not yet delivered or cancelled.
    pub async fn active_for(&self, merchant_id: &MerchantId) -> Vec<Assignment> {
        self.assignments_for(merchant_id)
            .await
            .into_iter()
            .filter(|a| !a.status.is_terminal())
            .collect()
    }

    pub async fn owner_of(&self, item_id: ItemId) -> Option<MerchantId> {
        self.state.read().await.owners.get(&item_id).cloned()
    }
}

#[async_trait]
impl Projection for MerchantAssignmentsView {
    fn name(&self) -> &'static str {
        "merchant_assignments"
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        let order_event = decode(event)?;
        let mut state = self.state.write().await;

        match order_event {
            OrderEvent::OrderPlaced(data) => {
                for item in data.items {
                    state.catalogue.insert(
                        item.id,
                        ItemInfo {
                            order_id: data.order_id,
                            order_number: data.order_number.clone(),
                            product_id: item.product_id,
                            product_name: item.product_name,
                            quantity: item.quantity,
                            total_price: item.total_price,
                        },
                    );
                }
            }
            OrderEvent::ItemClaimed(data) => {
                let Some(info) = state.catalogue.get(&data.item_id).cloned() else {
                    tracing::warn!(item_id = %data.item_id, "claim for an item never placed");
                    state.position = state.position.advance();
                    return Ok(());
                };
                state.owners.insert(data.item_id, data.merchant_id.clone());
                state.assignments.entry(data.merchant_id).or_default().insert(
                    data.item_id,
                    Assignment {
                        order_id: info.order_id,
                        order_number: info.order_number,
                        item_id: data.item_id,
                        product_id: info.product_id,
                        product_name: info.product_name,
                        quantity: info.quantity,
                        total_price: info.total_price,
                        status: ItemStatus::Assigned,
                        mode: data.mode,
                        claimed_at: data.claimed_at,
                        updated_at: data.claimed_at,
                    },
                );
            }
            OrderEvent::ItemStatusChanged(data) => {
                if let Some(assignment) = state.assignment_mut(data.item_id) {
                    assignment.status = data.to_status;
                    assignment.updated_at = data.changed_at;
                }
            }
            OrderEvent::OrderCancelled(data) => {
                for item_id in &data.cancelled_items {
                    if let Some(assignment) = state.assignment_mut(*item_id) {
                        assignment.status = ItemStatus::Cancelled;
                        assignment.updated_at = data.cancelled_at;
                    }
                }
            }
            OrderEvent::ItemRejected(_) | OrderEvent::OrderStatusChanged(_) => {}
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = BoardState::default();
        Ok(())
    }
}
