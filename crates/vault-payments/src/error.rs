//! Payment Error Types

use thiserror::Error;
use vault_core::VaultError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
///
/// A gateway that answers "not settled yet" is not an error; see
/// `FinalizeOutcome::Pending`.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Document or order absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Free document, duplicate purchase, malformed or mismatched finalize
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Gateway answered with a non-2xx status
    #[error("Gateway error ({status}): {body}")]
    Gateway { status: u16, body: String },

    /// Gateway unreachable, timed out, or returned an unreadable body
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Gateway { .. } | Self::Transport(_) | Self::Storage(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what) => format!("{what} not found"),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Gateway { .. } | Self::Transport(_) => {
                "Payment provider is unavailable. Please retry verification shortly.".into()
            }
            Self::WebhookSignature(_) | Self::WebhookParse(_) => "Invalid notification.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            Self::Storage(_) => "An error occurred processing your request.".into(),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Gateway {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<VaultError> for PaymentError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::NotFound(what) => Self::NotFound(what),
            VaultError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            VaultError::Config(msg) => Self::Config(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> PaymentError {
    PaymentError::Storage("store lock poisoned".into())
}
