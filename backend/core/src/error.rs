use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the mdchat runtime.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("'messages' must be a non-empty list")]
    EmptyMessages,

    #[error("chat {0} already has a submission in flight")]
    ChatBusy(Uuid),

    #[error("a submission is already in progress")]
    SubmitInProgress,

    #[error("chat not found: {0}")]
    ChatNotFound(Uuid),

    #[error("completion provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatError {
    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessages | ChatError::ChatBusy(_) | ChatError::ChatNotFound(_)
        )
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_messages_wording_is_stable() {
        assert_eq!(
            ChatError::EmptyMessages.to_string(),
            "'messages' must be a non-empty list"
        );
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(ChatError::ChatBusy(Uuid::nil()).is_client_error());
        assert!(!ChatError::Storage("disk".into()).is_client_error());
    }
}
