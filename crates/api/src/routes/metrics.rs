//! Prometheus exposition of the storefront counters.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Registers descriptions for the counters the domain emits.
pub fn describe() {
    metrics::describe_counter!("cart_items_added_total", "Successful add-to-cart calls");
    metrics::describe_counter!("cart_add_rejected_total", "Rejected add-to-cart calls");
    metrics::describe_counter!("orders_created_total", "Orders placed from carts");
    metrics::describe_counter!(
        "order_status_transitions_total",
        "Order status changes, labelled by target status"
    );
    metrics::describe_counter!("promocode_redemptions_total", "Promocodes applied at checkout");
    metrics::describe_counter!("payments_recorded_total", "Payments recorded against orders");
    metrics::describe_counter!(
        "payments_settled_total",
        "Payments settled, labelled by outcome"
    );
}

/// GET /metrics: renders the recorder in Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        handle.render(),
    )
}
