//! Per-item actions: claim or auto-assign, reject, status updates.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::{ItemId, MerchantId, OrderId};
use domain::{
    CommandResult, DomainError, ItemStatus, Order, OrderError, OrderItem, OrderStatus,
    UpdateItemStatus,
};
use lifecycle_log::LifecycleStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::{RequestActor, optional_body, parse_item_id, parse_order_id};
use crate::state::AppState;

/// Omitting `merchant_id` asks the engine to pick one.
#[derive(Debug, Deserialize, Default)]
pub struct AssignRequest {
    #[serde(default)]
    pub merchant_id: Option<MerchantId>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub merchant_id: MerchantId,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ItemStatus,
}

/// An item after an action, with the order status it produced.
#[derive(Serialize)]
pub struct ItemResponse {
    pub order_id: OrderId,
    pub order_status: OrderStatus,
    pub item: OrderItem,
    /// False when the action was a no-op and nothing was recorded.
    pub changed: bool,
}

impl ItemResponse {
    fn from_result(
        order_id: OrderId,
        item_id: ItemId,
        result: &CommandResult<Order>,
    ) -> Result<Self, ApiError> {
        let item = result
            .aggregate
            .item(item_id)
            .cloned()
            .ok_or_else(|| DomainError::from(OrderError::ItemNotFound { item_id }))?;
        Ok(Self {
            order_id,
            order_status: result.aggregate.status(),
            item,
            changed: !result.events.is_empty(),
        })
    }
}

fn parse_ids(order_id: &str, item_id: &str) -> Result<(OrderId, ItemId), ApiError> {
    Ok((parse_order_id(order_id)?, parse_item_id(item_id)?))
}

/// POST /orders/{id}/items/{item_id}/assign
#[tracing::instrument(skip(state, actor, payload))]
pub async fn assign<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((order_id, item_id)): Path<(String, String)>,
    RequestActor(actor): RequestActor,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    let (order_id, item_id) = parse_ids(&order_id, &item_id)?;
    let req = optional_body(payload)?;

    let result = match req.merchant_id {
        Some(merchant_id) => {
            state
                .assignment
                .claim(order_id, item_id, merchant_id, &actor)
                .await?
        }
        None => state.assignment.auto_assign(order_id, item_id, &actor).await?,
    };

    Ok(Json(ItemResponse::from_result(order_id, item_id, &result)?))
}

/// POST /orders/{id}/items/{item_id}/reject
///
/// Succeeds as a no-op once the item has left `pending` or the merchant has
/// already rejected it.
#[tracing::instrument(skip(state, actor, payload))]
pub async fn reject<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((order_id, item_id)): Path<(String, String)>,
    RequestActor(actor): RequestActor,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    let (order_id, item_id) = parse_ids(&order_id, &item_id)?;
    let Json(req) = payload?;

    let result = state
        .assignment
        .reject(order_id, item_id, req.merchant_id, &actor)
        .await?;

    Ok(Json(ItemResponse::from_result(order_id, item_id, &result)?))
}

/// PUT /orders/{id}/items/{item_id}/status
#[tracing::instrument(skip(state, actor, payload))]
pub async fn update_status<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((order_id, item_id)): Path<(String, String)>,
    RequestActor(actor): RequestActor,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    let (order_id, item_id) = parse_ids(&order_id, &item_id)?;
    let Json(req) = payload?;

    let result = state
        .orders
        .update_item_status(UpdateItemStatus::new(order_id, item_id, req.status), &actor)
        .await?;

    Ok(Json(ItemResponse::from_result(order_id, item_id, &result)?))
}
