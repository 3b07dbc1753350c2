use axum::response::IntoResponse;

use zkpool_coordinator::CoordinatorError;
use zkpool_taskdb::TaskStoreError;

/// The standardized error returned by the zkpool host.
#[derive(thiserror::Error, Debug)]
pub enum HostError {
    /// For invalid listen address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// For invalid configuration values.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// For I/O errors.
    #[error("There was a I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// For Serde errors.
    #[error("There was a deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// For task store errors.
    #[error("There was a task store error: {0}")]
    Store(#[from] TaskStoreError),

    /// For coordinator errors.
    #[error("There was a coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// For errors related to the tokio runtime.
    #[error("There was a tokio task error: {0}")]
    JoinHandle(#[from] tokio::task::JoinError),

    /// A catch-all error for any other error type.
    #[error("There was an unexpected error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for HostError {
    fn into_response(self) -> axum::response::Response {
        let (error, message) = match self {
            HostError::InvalidAddress(e) => ("invalid_address".to_string(), e),
            HostError::InvalidOption(e) => ("invalid_option".to_string(), e),
            HostError::Io(e) => ("io_error".to_string(), e.to_string()),
            HostError::Serde(e) => ("serde_error".to_string(), e.to_string()),
            HostError::Store(e) => ("store_error".to_string(), e.to_string()),
            HostError::Coordinator(e) => ("coordinator_error".to_string(), e.to_string()),
            HostError::JoinHandle(e) => ("join_handle_error".to_string(), e.to_string()),
            HostError::Anyhow(e) => ("anyhow_error".to_string(), e.to_string()),
        };
        axum::Json(serde_json::json!({ "status": "error", "error": error, "message": message }))
            .into_response()
    }
}

/// A type alias for the standardized result type returned by the zkpool host.
pub type HostResult<T> = Result<T, HostError>;
