use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a turn. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// Where a turn came from.
///
/// Synthetic turns are tagged when they are created so later readers (the
/// summary in particular) never have to guess from the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOrigin {
    /// Regular exchange: typed by the user or streamed from the model.
    #[default]
    Message,
    /// The greeting produced when a session starts.
    Greeting,
    /// Diagnostic or apology text produced locally after a failure.
    Notice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    /// Last modification time, refreshed on every content change.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
    #[serde(default)]
    pub origin: TurnOrigin,
}

impl Turn {
    fn new(sender: Sender, text: impl Into<String>, origin: TurnOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            is_streaming: false,
            origin,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text, TurnOrigin::Message)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, TurnOrigin::Message)
    }

    pub fn greeting(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, TurnOrigin::Greeting)
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, TurnOrigin::Notice)
    }

    /// Empty assistant turn that receives streamed text.
    pub fn placeholder() -> Self {
        Self {
            is_streaming: true,
            ..Self::new(Sender::Assistant, String::new(), TurnOrigin::Message)
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// A reply still waiting for its first fragment.
    pub fn is_pending(&self) -> bool {
        self.is_streaming && self.text.is_empty()
    }
}
