//! Errors surfaced by the chat orchestration layer.
//!
//! Every variant is recoverable: the controller turns it into transcript or
//! notification state and stays usable.

use trackwise_core::prompts::API_KEY_ERROR_MESSAGE;
use trackwise_core::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("AI service is not configured: missing API key")]
    Configuration,
    #[error("session creation failed: {0}")]
    SessionCreation(#[source] ServiceError),
    #[error("streaming failed: {0}")]
    Stream(#[source] ServiceError),
    #[error("summary failed: {0}")]
    Summary(#[source] ServiceError),
    #[error("no live session")]
    NotReady,
    #[error("another request is already in flight")]
    Busy,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("session was reset before the request finished")]
    Cancelled,
}

impl ChatError {
    /// Fixed text shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Configuration => API_KEY_ERROR_MESSAGE.to_string(),
            ChatError::SessionCreation(e) if e.is_auth() => {
                "Invalid API Key. Please check your API key configuration.".to_string()
            }
            ChatError::SessionCreation(_) => {
                "Could not create chat session. Please try again later.".to_string()
            }
            ChatError::Stream(e) if e.is_auth() => {
                "Streaming failed due to invalid API Key. Please check your API key configuration."
                    .to_string()
            }
            ChatError::Stream(_) => "Sorry, I couldn't get a response. Please try again.".to_string(),
            ChatError::Summary(e) if e.is_auth() => {
                "Summary generation failed due to invalid API Key.".to_string()
            }
            ChatError::Summary(ServiceError::EmptyResponse) => {
                "Failed to generate a valid summary from the AI.".to_string()
            }
            ChatError::Summary(_) => {
                "Sorry, I couldn't generate a summary for the conversation. Please try again."
                    .to_string()
            }
            ChatError::NotReady => "The chat isn't ready yet.".to_string(),
            ChatError::Busy => "Please wait for the current request to finish.".to_string(),
            ChatError::EmptyMessage => "Please type a message first.".to_string(),
            ChatError::Cancelled => "The chat was restarted.".to_string(),
        }
    }

    /// Refusals that leave all state untouched.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            ChatError::NotReady | ChatError::Busy | ChatError::EmptyMessage
        )
    }
}
