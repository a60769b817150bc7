//! Payment ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{PaymentId, PaymentStatus};
use domain::RecordPayment;
use serde::Deserialize;
use store::{Payment, Store};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub status: PaymentStatus,
}

/// POST /payments: record a pending payment for an order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<RecordPayment>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let payment = state
        .payments
        .record_payment(req)
        .await
        .map_err(ApiError::body_reference)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /payments/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let id: PaymentId = parse_id(&id, "payment")?;
    Ok(Json(state.payments.get_payment(id).await?))
}

/// PATCH /payments/:id/status: settle as succeeded or failed.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PaymentStatusRequest>,
) -> Result<Json<Payment>, ApiError> {
    let id: PaymentId = parse_id(&id, "payment")?;
    let payment = state.payments.update_payment_status(id, req.status).await?;
    Ok(Json(payment))
}
