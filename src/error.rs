//! Error types for request handling and generation.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::inference::binding::BindingError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("generation worker failed: {0}")]
    Worker(String),

    #[error("generation failed mid-stream: {0}")]
    Stream(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<tokio::task::JoinError> for BridgeError {
    fn from(err: tokio::task::JoinError) -> Self {
        BridgeError::Worker(err.to_string())
    }
}

/// Failures are reported in the body, not through the status code:
/// `{"status": false, "error": "..."}` with 200 OK.
impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        Json(json!({
            "status": false,
            "error": self.to_string(),
        }))
        .into_response()
    }
}
