//! Summary subsystem — one-shot recap of the conversation for a doctor visit
//!
//! Reads a transcript snapshot, never mutates it:
//! - drops the greeting and any reply still waiting for its first fragment
//! - renders the rest as `User:` / `TrackWise:` lines
//! - asks the model for a summary under the fixed summary instructions

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use trackwise_core::prompts::{
    ASSISTANT_NAME, SUMMARY_INSTRUCTION, SUMMARY_NOTHING_TO_SUMMARIZE, SUMMARY_TOO_SHORT,
    TRANSCRIPT_HEADER,
};
use trackwise_core::{
    ConversationService, ServiceError, Transcript, TrackwiseError, Turn, TurnOrigin,
};

use crate::error::ChatError;

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(text: String) -> Self {
        Self {
            text,
            created_at: Utc::now(),
        }
    }

    /// `TrackWise_Summary_YYYY-MM-DD.txt`, dated by creation (UTC).
    pub fn file_name(&self) -> String {
        format!(
            "{}_Summary_{}.txt",
            ASSISTANT_NAME,
            self.created_at.format("%Y-%m-%d")
        )
    }

    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, TrackwiseError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.text)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    Ready(Summary),
    /// Nothing beyond the greeting yet.
    TooShort,
    /// Turns exist but none survive filtering.
    NothingToSummarize,
}

impl SummaryOutcome {
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            SummaryOutcome::Ready(_) => None,
            SummaryOutcome::TooShort => Some(SUMMARY_TOO_SHORT),
            SummaryOutcome::NothingToSummarize => Some(SUMMARY_NOTHING_TO_SUMMARIZE),
        }
    }
}

/// Turns worth summarizing, in transcript order.
pub fn relevant_turns(turns: &[Turn]) -> Vec<&Turn> {
    turns
        .iter()
        .filter(|t| t.origin != TurnOrigin::Greeting && !t.is_pending())
        .collect()
}

pub fn render_transcript(turns: &[&Turn]) -> String {
    let mut transcript = format!("{}\n\n", TRANSCRIPT_HEADER);
    for turn in turns {
        let label = if turn.is_user() { "User" } else { ASSISTANT_NAME };
        transcript.push_str(&format!("{}: {}\n", label, turn.text));
    }
    transcript
}

pub async fn summarize(
    service: &dyn ConversationService,
    transcript: &Transcript,
) -> Result<SummaryOutcome, ChatError> {
    if transcript.len() <= 1 {
        return Ok(SummaryOutcome::TooShort);
    }

    let relevant = relevant_turns(transcript.turns());
    if relevant.is_empty() {
        return Ok(SummaryOutcome::NothingToSummarize);
    }

    let rendered = render_transcript(&relevant);
    tracing::info!(
        turns = relevant.len(),
        chars = rendered.len(),
        backend = service.name(),
        "Requesting conversation summary"
    );

    let text = service
        .generate_once(SUMMARY_INSTRUCTION, &rendered)
        .await
        .map_err(ChatError::Summary)?;

    if text.trim().is_empty() {
        return Err(ChatError::Summary(ServiceError::EmptyResponse));
    }

    Ok(SummaryOutcome::Ready(Summary::new(text)))
}
