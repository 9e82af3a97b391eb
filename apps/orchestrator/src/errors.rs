// [apps/orchestrator/src/errors.rs]
//! The seven-kind error taxonomy every internal failure is mapped into
//! before it reaches a caller, plus the HTTP realization of that
//! mapping. A request id threaded from the inbound call accompanies
//! every instance for correlation across logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nebula_infra_db::DbError;
use serde::Serialize;
use thiserror::Error;

use nebula_shared_observability::RequestId;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("downstream unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("request cancelled")]
    Cancelled,
}

impl OrchestratorError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Precondition(_) => "precondition",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Precondition(_) => StatusCode::PRECONDITION_FAILED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        }
    }
}

/// Maps store-level failures into the taxonomy: version conflicts and
/// missing rows have dedicated kinds; everything else is internal
/// because it signals an invariant the repository layer should have
/// prevented.
impl From<DbError> for OrchestratorError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            DbError::VersionConflict { entity, id } => {
                Self::Conflict(format!("{entity} {id} was modified concurrently"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Wraps an `OrchestratorError` with the request id it occurred under,
/// so the axum error response carries stable correlation metadata
/// without every handler threading it through by hand.
pub struct ApiError {
    pub request_id: RequestId,
    pub error: OrchestratorError,
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    #[must_use]
    pub fn new(request_id: RequestId, error: OrchestratorError) -> Self {
        Self { request_id, error, retry_after_seconds: None }
    }

    #[must_use]
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        tracing::error!(
            request_id = %self.request_id,
            kind = self.error.kind(),
            "{}",
            self.error
        );

        let body = ErrorBody {
            kind: self.error.kind().to_string(),
            message: self.error.to_string(),
            request_id: self.request_id.to_string(),
            field_errors: None,
            retry_after_seconds: self.retry_after_seconds,
        };

        (status, Json(body)).into_response()
    }
}
