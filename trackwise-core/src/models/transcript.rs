//! Ordered log of chat turns.
//!
//! The transcript owns its turns; callers mutate them only through the
//! methods below, which keep two rules: a turn's sender never changes, and at
//! most one assistant turn is streaming at any time.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::turn::Turn;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished turn. Streaming turns must go through [`begin_reply`].
    ///
    /// [`begin_reply`]: Transcript::begin_reply
    pub fn push(&mut self, mut turn: Turn) -> Uuid {
        turn.is_streaming = false;
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    /// Append an empty streaming assistant turn.
    ///
    /// Returns `None` when another reply is still streaming.
    pub fn begin_reply(&mut self) -> Option<Uuid> {
        if self.streaming_turn().is_some() {
            return None;
        }
        let turn = Turn::placeholder();
        let id = turn.id;
        self.turns.push(turn);
        Some(id)
    }

    /// Replace the text of a streaming turn with the accumulated text so far.
    ///
    /// Returns `false` if the turn is gone or has already finished.
    pub fn update_streaming(&mut self, id: Uuid, text: &str) -> bool {
        match self.turns.iter_mut().find(|t| t.id == id && t.is_streaming) {
            Some(turn) => {
                turn.text.clear();
                turn.text.push_str(text);
                turn.timestamp = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Freeze a streaming turn with its final text.
    pub fn finish_streaming(&mut self, id: Uuid, text: impl Into<String>) -> bool {
        match self.turns.iter_mut().find(|t| t.id == id && t.is_streaming) {
            Some(turn) => {
                turn.text = text.into();
                turn.is_streaming = false;
                turn.timestamp = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn streaming_turn(&self) -> Option<&Turn> {
        self.turns.iter().find(|t| t.is_streaming)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
