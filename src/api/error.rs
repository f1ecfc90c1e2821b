//! API error handling.
//!
//! Provides consistent error responses for the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::ClipscoutError;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Create a 409 Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ClipscoutError> for ApiError {
    fn from(err: ClipscoutError) -> Self {
        match err {
            ClipscoutError::NotFound(id) => {
                ApiError::not_found(format!("Task {} not found", id))
            }
            ClipscoutError::AlreadyTerminal(id) => {
                ApiError::conflict(format!("Task {} has already finished", id))
            }
            ClipscoutError::InvalidInput(msg) => ApiError::bad_request(msg),
            other => {
                tracing::error!("Unexpected error: {}", other);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::not_found("Task not found");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Task not found");
    }

    #[test]
    fn test_task_errors_map_to_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(
            ApiError::from(ClipscoutError::NotFound(id)).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ClipscoutError::AlreadyTerminal(id)).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ClipscoutError::InvalidInput("bad".into())).status,
            StatusCode::BAD_REQUEST
        );
    }
}
