//! Side-effect-free price quotes and the settings they use.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use domain::{PriceBreakdown, PricingConfig, PricingLine};
use lifecycle_log::LifecycleStore;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PricingRequest {
    pub items: Vec<PricingLine>,
}

/// POST /pricing/calculate
///
/// Runs the same computation checkout does, against the current settings.
#[tracing::instrument(skip(state, payload))]
pub async fn calculate<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<PricingRequest>, JsonRejection>,
) -> Result<Json<PriceBreakdown>, ApiError> {
    let Json(req) = payload?;
    let breakdown = state.orders.quote(&req.items).await?;
    Ok(Json(breakdown))
}

/// GET /settings
#[tracing::instrument(skip(state))]
pub async fn settings<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<PricingConfig>, ApiError> {
    Ok(Json(state.orders.pricing_config().await?))
}
