//! Error types for mbg-policy
//!
//! Every failure of a dispatch is surfaced to the caller; nothing is swallowed.

use thiserror::Error;

/// Result alias used across the library
pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Gateway id outside the known set
    #[error("invalid gateway: {0} (expected one of mbg1, mbg2, mbg3)")]
    InvalidGateway(String),

    /// Action outside allow/deny/show
    #[error("unknown command: {0} (expected one of allow, deny, show)")]
    InvalidAction(String),

    /// Action is valid but the gateway class does not support it
    #[error("unsupported operation: {action} is not available on {gateway}")]
    UnsupportedOperation { gateway: String, action: String },

    /// The external command could not be spawned or exited non-zero
    #[error("command failed: {command}: {message}")]
    CommandDispatchFailed { command: String, message: String },

    /// No control endpoint (cluster context or controller pod) was found
    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn dispatch_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::CommandDispatchFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn endpoint_not_found(what: impl Into<String>) -> Self {
        AppError::EndpointNotFound(what.into())
    }

    pub fn unsupported(gateway: impl ToString, action: impl ToString) -> Self {
        AppError::UnsupportedOperation {
            gateway: gateway.to_string(),
            action: action.to_string(),
        }
    }

    /// Whether the failure may go away if the operation is retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::CommandDispatchFailed { .. } | AppError::EndpointNotFound(_)
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
