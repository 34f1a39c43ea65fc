//! JSON error responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use mdchat_core::ChatError;

/// An error rendered as `{"error": message}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::EmptyMessages => StatusCode::BAD_REQUEST,
            ChatError::ChatBusy(_) | ChatError::SubmitInProgress => StatusCode::CONFLICT,
            ChatError::ChatNotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Provider { .. } | ChatError::Storage(_) | ChatError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.message, "Request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn chat_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(ChatError::EmptyMessages).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ChatError::ChatBusy(Uuid::nil())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ChatError::ChatNotFound(Uuid::nil())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ChatError::Storage("disk full".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn empty_messages_keeps_its_wording() {
        let err = ApiError::from(ChatError::EmptyMessages);
        assert_eq!(err.message(), "'messages' must be a non-empty list");
    }
}
