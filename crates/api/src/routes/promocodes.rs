//! Promocode catalogue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::PromocodeId;
use domain::PromocodeUpdate;
use store::{NewPromocode, Promocode, Store};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::extract::ApiJson;

/// POST /promocodes
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<NewPromocode>,
) -> Result<(StatusCode, Json<Promocode>), ApiError> {
    let promocode = state.promocodes.create_promocode(req).await?;
    Ok((StatusCode::CREATED, Json(promocode)))
}

/// GET /promocodes
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Promocode>>, ApiError> {
    Ok(Json(state.promocodes.list_promocodes().await?))
}

/// GET /promocodes/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Promocode>, ApiError> {
    let id: PromocodeId = parse_id(&id, "promocode")?;
    Ok(Json(state.promocodes.get_promocode(id).await?))
}

/// PATCH /promocodes/:id
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PromocodeUpdate>,
) -> Result<Json<Promocode>, ApiError> {
    let id: PromocodeId = parse_id(&id, "promocode")?;
    Ok(Json(state.promocodes.update_promocode(id, req).await?))
}

/// DELETE /promocodes/:id: also drops its redemption history.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: PromocodeId = parse_id(&id, "promocode")?;
    state.promocodes.delete_promocode(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
