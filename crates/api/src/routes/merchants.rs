//! Merchant-facing queries: directory lookup, open items, assignment board.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use common::MerchantId;
use domain::{MerchantCandidate, ProductId};
use lifecycle_log::LifecycleStore;
use projections::{Assignment, OpenItem};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct AreaQuery {
    #[serde(default)]
    pub area: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BoardQuery {
    /// Only items not yet delivered or cancelled.
    #[serde(default)]
    pub active: bool,
}

/// GET /merchants/by-product/{product_id}?area=
///
/// Every directory candidate in ranking order; eligibility filtering is left
/// to assignment.
#[tracing::instrument(skip(state, query))]
pub async fn by_product<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
    query: Result<Query<AreaQuery>, QueryRejection>,
) -> Result<Json<Vec<MerchantCandidate>>, ApiError> {
    let Query(query) = query?;
    let area = query.area.as_deref().filter(|a| !a.is_empty());

    let candidates = state
        .assignment
        .candidates_for(&ProductId::new(product_id), area)
        .await?;
    Ok(Json(candidates))
}

/// GET /merchants/{merchant_id}/open-items
#[tracing::instrument(skip(state))]
pub async fn open_items<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(merchant_id): Path<String>,
) -> Result<Json<Vec<OpenItem>>, ApiError> {
    state.refresh_views().await?;
    let items = state
        .open_items
        .open_items_for(&MerchantId::new(merchant_id))
        .await;
    Ok(Json(items))
}

/// GET /merchants/{merchant_id}/assignments?active=
#[tracing::instrument(skip(state, query))]
pub async fn assignments<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(merchant_id): Path<String>,
    query: Result<Query<BoardQuery>, QueryRejection>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let Query(query) = query?;
    state.refresh_views().await?;

    let merchant_id = MerchantId::new(merchant_id);
    let board = if query.active {
        state.merchant_assignments.active_for(&merchant_id).await
    } else {
        state.merchant_assignments.assignments_for(&merchant_id).await
    };
    Ok(Json(board))
}
