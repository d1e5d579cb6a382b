//! Error Types

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    /// Document, user or file absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected by validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl VaultError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what) => format!("{what} not found"),
            Self::InvalidRequest(msg) | Self::Forbidden(msg) => msg.clone(),
            Self::Unauthorized(_) => "Unauthorized: Invalid token".into(),
            Self::Storage(_) | Self::Io(_) => "Storage is temporarily unavailable. Please try again.".into(),
            _ => "Server error".into(),
        }
    }
}

impl From<anyhow::Error> for VaultError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Map a poisoned lock into a storage error.
pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> VaultError {
    VaultError::Storage("store lock poisoned".into())
}
