//! Common error types used across all Temps console services

use thiserror::Error;

/// Common service error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unauthorized: {provider}")]
    Unauthorized { provider: String },

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// How a failure is surfaced to the user.
///
/// Every error that reaches a view ends up in exactly one of these buckets:
/// an expired or missing credential asks for a new login, a client-side
/// validation problem is shown inline next to the field, and anything else
/// becomes a generic message the user may retry by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Unauthorized,
    Validation,
    Unexpected,
}

impl ErrorClass {
    pub fn requires_login(self) -> bool {
        matches!(self, ErrorClass::Unauthorized)
    }
}

/// Generic message shown for unexpected failures
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

impl ServiceError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            ServiceError::Unauthorized { .. } => ErrorClass::Unauthorized,
            ServiceError::Validation { .. } => ErrorClass::Validation,
            _ => ErrorClass::Unexpected,
        }
    }

    pub fn requires_login(&self) -> bool {
        self.classify().requires_login()
    }

    /// Message safe to show in a banner or inline hint
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Unauthorized { provider } => {
                format!("Your {} session has expired. Please log in again.", provider)
            }
            ServiceError::Validation { field, message } => format!("{}: {}", field, message),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
