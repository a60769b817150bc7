//! HTTP API server for the pharmacy storefront.
//!
//! Exposes the catalogue, carts, orders, payments and promocodes as REST
//! endpoints, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{carts, health, medicines, metrics, orders, payments, promocodes};

    let metrics_router = Router::new()
        .route("/metrics", get(metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health::check))
        .route(
            "/medicines",
            post(medicines::create::<S>).get(medicines::list::<S>),
        )
        .route(
            "/medicines/{id}",
            get(medicines::get::<S>)
                .patch(medicines::update::<S>)
                .delete(medicines::delete::<S>),
        )
        .route("/users/{id}/cart", get(carts::get::<S>).delete(carts::clear::<S>))
        .route("/users/{id}/cart/items", post(carts::add_item::<S>))
        .route(
            "/users/{id}/cart/items/{medicine_id}",
            patch(carts::update_item::<S>).delete(carts::remove_item::<S>),
        )
        .route(
            "/users/{id}/orders",
            post(orders::create::<S>).get(orders::list::<S>),
        )
        .route(
            "/order/{id}",
            get(orders::get::<S>).patch(orders::update::<S>),
        )
        .route("/order/{id}/status", patch(orders::update_status::<S>))
        .route("/order/{id}/payments", get(orders::payments::<S>))
        .route("/payments", post(payments::create::<S>))
        .route("/payments/{id}", get(payments::get::<S>))
        .route("/payments/{id}/status", patch(payments::update_status::<S>))
        .route(
            "/promocodes",
            post(promocodes::create::<S>).get(promocodes::list::<S>),
        )
        .route(
            "/promocodes/{id}",
            get(promocodes::get::<S>)
                .patch(promocodes::update::<S>)
                .delete(promocodes::delete::<S>),
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

/// Creates the default application state with every service over `store`.
pub fn create_default_state<S: Store + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store))
}
