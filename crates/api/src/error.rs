//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};

/// API-level error type that maps to HTTP responses.
///
/// Every response carries `{"code": ..., "error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Domain error about a resource addressed by the request path.
    Domain(DomainError),
    /// Domain error caused by an id or code in the request body. Absent
    /// resources answer 400 instead of 404.
    BodyReference(DomainError),
    /// Bad request from the client.
    BadRequest(String),
}

impl ApiError {
    /// Wraps an error from an operation whose inputs come from the body.
    pub fn body_reference(err: DomainError) -> Self {
        ApiError::BodyReference(err)
    }

    /// Returns the HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(err) => domain_status(err),
            ApiError::BodyReference(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::BAD_REQUEST,
                _ => domain_status(err),
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Domain(err) | ApiError::BodyReference(err) => err.code(),
            ApiError::BadRequest(_) => "VALIDATION_FAILED",
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::PromocodeCodeTaken(_)
        | DomainError::MedicineInUse { .. }
        | DomainError::PaymentAlreadySettled { .. } => StatusCode::CONFLICT,
        _ => match err.kind() {
            ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            ApiError::Domain(err) | ApiError::BodyReference(err) => {
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "internal server error");
                    "internal server error".to_string()
                } else {
                    tracing::debug!(code, error = %err, "request rejected");
                    err.to_string()
                }
            }
            ApiError::BadRequest(msg) => msg,
        };

        let body = serde_json::json!({ "code": code, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
