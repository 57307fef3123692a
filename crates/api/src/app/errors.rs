//! Every failure leaves as `{ "error": code, "message": msg }`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use stockledger_core::DomainError;
use stockledger_events::ProjectionError;
use stockledger_infra::command_dispatcher::DispatchError;
use stockledger_infra::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request: bad header, body, query string or path id.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Dispatch(DispatchError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl From<WorkflowError> for ApiError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::Domain(e) => ApiError::Domain(e),
            WorkflowError::Dispatch(e) => ApiError::Dispatch(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Dispatch(DispatchError::Domain(e)) => domain_error_to_response(e),
            ApiError::Dispatch(DispatchError::Concurrency(msg)) => json_error(StatusCode::CONFLICT, "conflict", msg),
            ApiError::Dispatch(DispatchError::TenantIsolation(msg)) => {
                json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg)
            }
            ApiError::Dispatch(other) => internal(other.to_string()),
            ApiError::Projection(ProjectionError::TenantIsolation(msg)) => {
                json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg)
            }
            ApiError::Projection(other) => internal(other.to_string()),
        }
    }
}

fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvariantViolation(msg) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "tenant_isolation", "unauthorized"),
    }
}

fn internal(detail: String) -> Response {
    error!(error = %detail, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
