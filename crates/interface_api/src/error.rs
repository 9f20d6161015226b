//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_kernel::PortError;
use domain_claims::{ClaimError, RulesError};
use infra_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Claim fields the caller has to supply or correct
    #[error("{message}")]
    ClaimFields { message: String, fields: Vec<String> },

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Failures while assembling [`AppState`](crate::AppState)
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Object store unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Decision table {path}: {source}")]
    DecisionTable {
        path: String,
        #[source]
        source: RulesError,
    },
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::Storage(msg) => (StatusCode::BAD_GATEWAY, "storage_error", msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg),
            ApiError::ClaimFields { message, fields } => {
                details = Some(fields);
                (StatusCode::UNPROCESSABLE_ENTITY, "claim_fields", message)
            }
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::MissingFields(_) | ClaimError::InvalidFields(_) => ApiError::ClaimFields {
                fields: err.offending_fields(),
                message: err.to_string(),
            },
            ClaimError::NoDraft | ClaimError::NoReview | ClaimError::Serialization(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ClaimError::StageTimeout { .. } => ApiError::Timeout(err.to_string()),
            ClaimError::InvalidEdi(_) | ClaimError::Rules(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { .. } => ApiError::BadRequest(err.to_string()),
            PortError::Timeout { .. } => ApiError::Timeout(err.to_string()),
            PortError::Unauthorized { .. } => ApiError::Forbidden(err.to_string()),
            PortError::Connection { .. } | PortError::Internal { .. } => {
                ApiError::Storage(err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(permission) => {
                ApiError::Forbidden(format!("missing permission {}", permission))
            }
            AuthError::InvalidToken | AuthError::TokenExpired => ApiError::Unauthorized,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}
