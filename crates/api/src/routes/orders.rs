//! Order placement and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, OrderStatus, UserId};
use domain::{CreateOrder, OrderUpdate};
use serde::Deserialize;
use store::{Order, Payment, Store};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::extract::ApiJson;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub delivery_address: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub promocode: Option<String>,
}

impl CreateOrderRequest {
    fn into_command(self, user_id: UserId) -> CreateOrder {
        let cmd = CreateOrder::new(user_id, self.delivery_address).with_comment(self.comment);
        match self.promocode {
            Some(code) => cmd.with_promocode(code),
            None => cmd,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub order_status: OrderStatus,
}

// -- Handlers --

/// POST /users/:id/orders: check out the user's cart.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let user_id: UserId = parse_id(&user_id, "user")?;
    let order = state
        .orders
        .create_order(req.into_command(user_id))
        .await
        .map_err(ApiError::body_reference)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /users/:id/orders: the user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user")?;
    Ok(Json(state.orders.list_orders(user_id).await?))
}

/// GET /order/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.orders.get_order(id).await?))
}

/// PATCH /order/:id: change address, comment or status.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<OrderUpdate>,
) -> Result<Json<Order>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.orders.update_order(id, req).await?))
}

/// PATCH /order/:id/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let order = state
        .orders
        .transition_status(id, req.order_status)
        .await?;
    Ok(Json(order))
}

/// GET /order/:id/payments: payments recorded against the order.
#[tracing::instrument(skip(state))]
pub async fn payments<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    Ok(Json(state.payments.list_payments(id).await?))
}
