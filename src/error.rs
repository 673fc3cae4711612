//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{DomainError, ErrorKind};
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Ledger errors (validation, not found, conflict)
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(e) => AppError::Domain(e),
            StoreError::Database(e) => AppError::Database(e),
            StoreError::MaxRetriesExceeded => {
                AppError::StoreUnavailable("transaction retries exhausted".to_string())
            }
            StoreError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl AppError {
    /// Ledger error classification, if this is a ledger error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Domain(e) => Some(e.kind()),
            AppError::InvalidRequest(_) => Some(ErrorKind::Validation),
            _ => None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // Ledger errors map by kind: 400 / 404 / 409
            AppError::Domain(domain_err) => {
                let status = match domain_err.kind() {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                };
                (status, domain_err.error_code(), Some(domain_err.to_string()))
            }

            // 503 Service Unavailable
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", None)
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
