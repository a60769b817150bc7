//! Cart endpoints, addressed by user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{MedicineId, UserId};
use domain::DomainError;
use serde::{Deserialize, Serialize};
use store::{Cart, Store};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::extract::ApiJson;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub medicine_id: MedicineId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    pub user_id: UserId,
    pub cleared: bool,
}

// -- Handlers --

/// POST /users/:id/cart/items: add a medicine to the user's cart.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> Result<(StatusCode, Json<Cart>), ApiError> {
    let user_id: UserId = parse_id(&user_id, "user")?;
    let cart = state
        .carts
        .add_item(user_id, req.medicine_id, req.quantity)
        .await
        .map_err(ApiError::body_reference)?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// PATCH /users/:id/cart/items/:medicine_id: set a line's quantity.
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, medicine_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user")?;
    let medicine_id: MedicineId = parse_id(&medicine_id, "medicine")?;
    let cart = state
        .carts
        .update_item_quantity(user_id, medicine_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /users/:id/cart/items/:medicine_id
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, medicine_id)): Path<(String, String)>,
) -> Result<Json<Cart>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user")?;
    let medicine_id: MedicineId = parse_id(&medicine_id, "medicine")?;
    Ok(Json(state.carts.remove_item(user_id, medicine_id).await?))
}

/// GET /users/:id/cart
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Cart>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user")?;
    Ok(Json(state.carts.get_cart(user_id).await?))
}

/// DELETE /users/:id/cart: empty the cart. 404 when the user never had one.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user")?;
    if !state.carts.clear_cart(user_id).await? {
        return Err(DomainError::CartNotFound(user_id).into());
    }
    Ok(Json(ClearCartResponse {
        user_id,
        cleared: true,
    }))
}
