//! Error types for the node
//!
//! [`ApiError`] is what handlers return; it renders as
//! `{"error": "<message>"}` with a matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use landchain_core::ChainError;

/// Handler error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Caller sent something unusable
    #[error("{0}")]
    BadRequest(String),

    /// Requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Ledger operation failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Chain(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Chain(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {e}"))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(format!("io error: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Peer communication errors
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport failure or timeout
    #[error("request to {node} failed: {source}")]
    Request {
        node: String,
        #[source]
        source: reqwest::Error,
    },

    /// Peer answered with a non-success status
    #[error("{node} answered {status}")]
    Status { node: String, status: u16 },

    /// Peer sent a chain that does not hold together
    #[error("{node} sent an inconsistent chain: {reason}")]
    InvalidChain { node: String, reason: String },
}
