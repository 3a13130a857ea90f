use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::turn::Sender;

/// One completed message in the provider-side conversation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub text: String,
}

/// Reference to a remote conversation context.
///
/// Bound at creation to its fully-resolved instruction text. Clones share the
/// same history, so a handle can be moved into a stream and still record the
/// exchange once the reply completes.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    instructions: Arc<str>,
    created_at: DateTime<Utc>,
    history: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl SessionHandle {
    pub fn new(instructions: impl Into<Arc<str>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            instructions: instructions.into(),
            created_at: Utc::now(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        match self.history.lock() {
            Ok(h) => h.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Record a completed user/model exchange.
    pub fn record_exchange(&self, prompt: &str, reply: &str) {
        let mut history = match self.history.lock() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        history.push(HistoryEntry {
            sender: Sender::User,
            text: prompt.to_string(),
        });
        history.push(HistoryEntry {
            sender: Sender::Assistant,
            text: reply.to_string(),
        });
    }

    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.id == other.id
    }
}
