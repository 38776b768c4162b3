//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing or invalid caller identity")]
    Unauthenticated,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// HTTP status for a ledger error
fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::SenderAccountNotFound(_)
        | DomainError::RecipientAccountNotFound(_)
        | DomainError::AccountNotFound(_)
        | DomainError::UserNotFound(_) => StatusCode::NOT_FOUND,

        DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,

        DomainError::InvalidAmount(_)
        | DomainError::InsufficientFunds { .. }
        | DomainError::SameAccountTransfer
        | DomainError::AccountLimitExceeded { .. }
        | DomainError::InvalidRequest(_) => StatusCode::BAD_REQUEST,

        DomainError::EmailAlreadyRegistered => StatusCode::CONFLICT,
        DomainError::InvalidCredentials => StatusCode::UNAUTHORIZED,

        DomainError::AccountNumberCollision { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        DomainError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 401 Unauthorized
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),

            // Ledger errors
            AppError::Domain(domain_err) => {
                let status = domain_status(domain_err);
                if status.is_server_error() {
                    tracing::error!(kind = domain_err.kind(), "Ledger error: {}", domain_err);
                }
                let details = match domain_err {
                    DomainError::InsufficientFunds { .. }
                    | DomainError::AccountLimitExceeded { .. }
                    | DomainError::SameAccountTransfer
                    | DomainError::EmailAlreadyRegistered
                    | DomainError::InvalidCredentials
                    | DomainError::AccountNumberCollision { .. }
                    | DomainError::StorageFailure(_) => None,
                    other => Some(other.to_string()),
                };
                (status, domain_err.kind(), details)
            }
        };

        // Storage details stay in the logs
        let error = match &self {
            AppError::Domain(DomainError::StorageFailure(_)) => "Storage temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
