//! HTTP API for order fulfillment.
//!
//! Exposes checkout, merchant assignment, item status updates, pricing
//! quotes and the lifecycle feed, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use lifecycle_log::LifecycleStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: LifecycleStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/lifecycle", get(routes::orders::lifecycle::<S>))
        .route(
            "/orders/{id}/items/{item_id}/assign",
            post(routes::items::assign::<S>),
        )
        .route(
            "/orders/{id}/items/{item_id}/reject",
            post(routes::items::reject::<S>),
        )
        .route(
            "/orders/{id}/items/{item_id}/status",
            put(routes::items::update_status::<S>),
        )
        .route("/pricing/calculate", post(routes::pricing::calculate::<S>))
        .route("/settings", get(routes::pricing::settings::<S>))
        .route(
            "/merchants/by-product/{product_id}",
            get(routes::merchants::by_product::<S>),
        )
        .route(
            "/merchants/{merchant_id}/open-items",
            get(routes::merchants::open_items::<S>),
        )
        .route(
            "/merchants/{merchant_id}/assignments",
            get(routes::merchants::assignments::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
