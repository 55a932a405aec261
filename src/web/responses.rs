use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Canonical JSON payload for error and notice responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type used by the JSON API handlers.
pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiMessage>)>;

/// Helper for handlers that need to return `(StatusCode, Json<ApiMessage>)`.
pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiMessage>) {
    (status, Json(ApiMessage::new(message)))
}
