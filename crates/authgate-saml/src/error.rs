//! Broker-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for broker operations
pub type SsoResult<T> = Result<T, SsoError>;

/// Errors produced by the SSO broker
#[derive(Debug, Error)]
pub enum SsoError {
    /// Required configuration is missing or unusable (cert, key, endpoint)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inbound assertion failed validation (signature, issuer, audience, expiry)
    #[error("Assertion validation failed: {0}")]
    AssertionValidation(String),

    /// Inbound LogoutRequest/LogoutResponse is malformed or failed validation
    #[error("Invalid logout message: {0}")]
    InvalidLogoutRequest(String),

    /// Cache miss on the polling endpoint; an expected outcome, not a fault
    #[error("Not found")]
    NotFound,

    /// Caller has no authenticated browser session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::ledger::LedgerError> for SsoError {
    fn from(e: crate::ledger::LedgerError) -> Self {
        SsoError::Internal(e.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for SsoError {
    fn into_response(self) -> Response {
        // Recoverable protocol failures are translated to redirects by the
        // handlers before they reach this point; what remains maps to a
        // status code. NotAuthenticated stays a silent redirect home and
        // NotFound stays unlogged: both are expected outcomes.
        match &self {
            SsoError::NotAuthenticated => return Redirect::to("/").into_response(),
            SsoError::NotFound => {
                tracing::debug!("Identity cache miss");
                return StatusCode::NOT_FOUND.into_response();
            }
            _ => {}
        }

        let (status, error_code) = match &self {
            SsoError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            SsoError::AssertionValidation(_) => {
                (StatusCode::BAD_REQUEST, "assertion_validation_failed")
            }
            SsoError::InvalidLogoutRequest(_) => (StatusCode::BAD_REQUEST, "invalid_logout"),
            SsoError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            SsoError::NotAuthenticated | SsoError::NotFound => unreachable!(),
        };

        let message = match &self {
            SsoError::Configuration(msg) => {
                tracing::error!(error = %msg, "SSO configuration error");
                "Service provider is not configured correctly".to_string()
            }
            SsoError::Internal(msg) => {
                tracing::error!(error = %msg, "SSO internal error");
                "An internal error occurred".to_string()
            }
            // Safe user-facing messages
            SsoError::AssertionValidation(_) | SsoError::InvalidLogoutRequest(_) => {
                self.to_string()
            }
            SsoError::NotAuthenticated | SsoError::NotFound => unreachable!(),
        };

        let body = ErrorResponse {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
