//! API Errors
//!
//! Every failure leaves the server as `(status, {success: false, error, code})`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use vault_core::VaultError;
use vault_payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

/// Handler error
#[derive(Debug, thiserror::Error)]
#[error("{code} ({status}): {error}")]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub code: &'static str,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            code,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", error)
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", error)
    }

    pub fn forbidden(error: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", error)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
    }

    pub fn payments_disabled() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    }

    pub fn session_expired() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "SESSION_EXPIRED",
            "Purchase session expired. Please start a new purchase.",
        )
    }

    pub fn payment_pending() -> Self {
        Self::new(
            StatusCode::PAYMENT_REQUIRED,
            "PAYMENT_PENDING",
            "Payment not completed. Please complete the payment and try again.",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.error,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        let message = err.user_message();
        match err {
            VaultError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            VaultError::InvalidRequest(_) => Self::bad_request(message),
            VaultError::Unauthorized(_) => Self::unauthorized(message),
            VaultError::Forbidden(_) => Self::forbidden(message),
            other => {
                tracing::error!(error = %other, "Request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", message)
            }
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let message = err.user_message();
        match err {
            PaymentError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            PaymentError::InvalidRequest(_) => Self::bad_request(message),
            PaymentError::Gateway { .. } | PaymentError::Transport(_) => {
                tracing::warn!(error = %err, "Payment gateway failure");
                Self::new(StatusCode::BAD_GATEWAY, "GATEWAY_ERROR", message)
            }
            PaymentError::WebhookSignature(_) => Self::new(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", message),
            PaymentError::WebhookParse(_) => Self::new(StatusCode::BAD_REQUEST, "INVALID_WEBHOOK", message),
            PaymentError::Config(_) | PaymentError::Storage(_) => {
                tracing::error!(error = %err, "Payment processing failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_ERROR", message)
            }
        }
    }
}
