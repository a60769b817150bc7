//! Medicine catalogue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::MedicineId;
use domain::MedicineUpdate;
use serde::Deserialize;
use store::{Medicine, NewMedicine, Store};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

#[derive(Debug, Default, Deserialize)]
pub struct ListMedicinesQuery {
    #[serde(default)]
    pub in_stock: bool,
}

/// POST /medicines: add a medicine to the catalogue.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<NewMedicine>,
) -> Result<(StatusCode, Json<Medicine>), ApiError> {
    let medicine = state.medicines.create_medicine(req).await?;
    Ok((StatusCode::CREATED, Json(medicine)))
}

/// GET /medicines: list the catalogue, optionally only what is in stock.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiQuery(query): ApiQuery<ListMedicinesQuery>,
) -> Result<Json<Vec<Medicine>>, ApiError> {
    let medicines = state.medicines.list_medicines(query.in_stock).await?;
    Ok(Json(medicines))
}

/// GET /medicines/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Medicine>, ApiError> {
    let id: MedicineId = parse_id(&id, "medicine")?;
    Ok(Json(state.medicines.get_medicine(id).await?))
}

/// PATCH /medicines/:id: partial update; stock changes go through here.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<MedicineUpdate>,
) -> Result<Json<Medicine>, ApiError> {
    let id: MedicineId = parse_id(&id, "medicine")?;
    Ok(Json(state.medicines.update_medicine(id, req).await?))
}

/// DELETE /medicines/:id: refused while any cart holds the medicine.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: MedicineId = parse_id(&id, "medicine")?;
    state.medicines.delete_medicine(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
