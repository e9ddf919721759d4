//! Checkout, order lookup, cancellation and the lifecycle feed.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::order::StatusHistoryEntry;
use domain::{
    Aggregate, CancelOrder, CustomerId, DeliveryAddress, LifecycleFilter, Money, NewOrderItem,
    Order, OrderItem, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus, PlaceOrder,
    PriceBreakdown,
};
use lifecycle_log::{LifecycleEvent, LifecycleStore, Sequence};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::{RequestActor, optional_body, parse_order_id};
use crate::state::AppState;

/// Checkout submission.
#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: CustomerId,
    pub items: Vec<NewOrderItem>,
    /// Defaults to cash on delivery.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub delivery_address: DeliveryAddress,
}

#[derive(Deserialize, Default)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// An order as returned by the API.
#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: Option<OrderId>,
    pub order_number: Option<OrderNumber>,
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub pricing: Option<PriceBreakdown>,
    #[serde(rename = "total_amount_cents")]
    pub total_amount: Money,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub delivery_address: DeliveryAddress,
    pub status_history: Vec<StatusHistoryEntry>,
    pub created_at: Option<DateTime<Utc>>,
    pub sequence: Sequence,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            order_number: order.order_number().cloned(),
            customer_id: order.customer_id(),
            status: order.status(),
            items: order.items().to_vec(),
            pricing: order.pricing().cloned(),
            total_amount: order.total_amount(),
            payment_method: order.payment_method().cloned(),
            payment_status: order.payment_status(),
            delivery_address: order.delivery_address().clone(),
            status_history: order.status_history().to_vec(),
            created_at: order.created_at(),
            sequence: order.sequence(),
        }
    }
}

/// POST /orders
#[tracing::instrument(skip(state, actor, payload))]
pub async fn place<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequestActor(actor): RequestActor,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload?;

    let cmd = PlaceOrder::new(
        req.customer_id,
        req.items,
        req.payment_method.unwrap_or(PaymentMethod::CashOnDelivery),
        req.delivery_address,
    );
    let result = state.orders.place_order(cmd, &actor).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from(&result.aggregate)),
    ))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, actor, payload))]
pub async fn cancel<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    RequestActor(actor): RequestActor,
    payload: Result<Json<CancelOrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let req = optional_body(payload)?;

    let result = state
        .orders
        .cancel_order(CancelOrder::new(order_id, req.reason), &actor)
        .await?;

    Ok(Json(OrderResponse::from(&result.aggregate)))
}

/// GET /orders/{id}/lifecycle?item_id=&event_type=
#[tracing::instrument(skip(state, query))]
pub async fn lifecycle<S: LifecycleStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    query: Result<Query<LifecycleFilter>, QueryRejection>,
) -> Result<Json<Vec<LifecycleEvent>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Query(filter) = query?;

    let events = state.orders.lifecycle(order_id, filter).await?;
    Ok(Json(events))
}
