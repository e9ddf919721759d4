//! Open-item pool: pending items merchants may still claim.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, MerchantId, OrderId};
use domain::{Money, OrderEvent, OrderNumber, ProductId};
use lifecycle_log::LifecycleEvent;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, decode};

/// An unclaimed item as a merchant sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenItem {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub item_id: ItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    #[serde(rename = "total_price_cents")]
    pub total_price: Money,
    pub area: String,
    pub placed_at: DateTime<Utc>,
    #[serde(skip)]
    rejected_by: BTreeSet<MerchantId>,
}

#[derive(Debug, Default)]
struct OpenItemsState {
    items: HashMap<ItemId, OpenItem>,
    position: ProjectionPosition,
}

/// Pending items, minus each merchant's rejections.
#[derive(Debug, Clone, Default)]
pub struct OpenItemsView {
    state: Arc<RwLock<OpenItemsState>>,
}

impl OpenItemsView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items `merchant_id` has not rejected, oldest order first.
    pub async fn open_items_for(&self, merchant_id: &MerchantId) -> Vec<OpenItem> {
        let state = self.state.read().await;
        let mut items: Vec<OpenItem> = state
            .items
            .values()
            .filter(|item| !item.rejected_by.contains(merchant_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.placed_at
                .cmp(&b.placed_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        items
    }

    pub async fn is_open(&self, item_id: ItemId) -> bool {
        self.state.read().await.items.contains_key(&item_id)
    }

    pub async fn open_count(&self) -> usize {
        self.state.read().await.items.len()
    }
}

#[async_trait]
impl Projection for OpenItemsView {
    fn name(&self) -> &'static str {
        "open_items"
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        let order_event = decode(event)?;
        let mut state = self.state.write().await;

        match order_event {
            OrderEvent::OrderPlaced(data) => {
                for item in data.items {
                    state.items.insert(
                        item.id,
                        OpenItem {
                            order_id: data.order_id,
                            order_number: data.order_number.clone(),
                            item_id: item.id,
                            product_id: item.product_id,
                            product_name: item.product_name,
                            quantity: item.quantity,
                            total_price: item.total_price,
                            area: data.delivery_address.area.clone(),
                            placed_at: data.placed_at,
                            rejected_by: item.rejected_by,
                        },
                    );
                }
            }
            OrderEvent::ItemClaimed(data) => {
                state.items.remove(&data.item_id);
            }
            OrderEvent::ItemRejected(data) => {
                if let Some(item) = state.items.get_mut(&data.item_id) {
                    item.rejected_by.insert(data.merchant_id);
                }
            }
            OrderEvent::OrderCancelled(data) => {
                for item_id in &data.cancelled_items {
                    state.items.remove(item_id);
                }
            }
            OrderEvent::ItemStatusChanged(_) | OrderEvent::OrderStatusChanged(_) => {}
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = OpenItemsState::default();
        Ok(())
    }
}
