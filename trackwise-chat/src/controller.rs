//! Chat controller — composes session, streaming and summary under one state
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! await. Every transcript change is published on a `watch` channel.
//!
//! Each `start_session`/`reset` bumps a generation counter and cancels the
//! in-flight reply. Work started under an older generation finishes as a
//! no-op with `ChatError::Cancelled`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use trackwise_core::config::NotificationConfig;
use trackwise_core::prompts::{DOCTOR_DISCUSSION_PHRASE, FLAG_NOTICE, MARKER_NOTICE, STREAM_APOLOGY};
use trackwise_core::{
    ConversationService, GeminiConversationClient, Profile, ServiceError, SessionHandle,
    TrackwiseConfig, TrackwiseError, Transcript, Turn,
};
use uuid::Uuid;

use crate::error::ChatError;
use crate::subsystems::assembler::{self, StreamOutcome};
use crate::subsystems::notify::{
    Notifier, ERROR_NOTICE_DURATION, MARKER_NOTICE_DURATION, TOO_SHORT_NOTICE_DURATION,
};
use crate::subsystems::session;
use crate::subsystems::summary::{self, SummaryOutcome};

#[derive(Debug, Clone)]
enum SessionPhase {
    Idle,
    Initializing,
    Ready(SessionHandle),
    Failed(String),
}

#[derive(Debug)]
enum SendPhase {
    Idle,
    Sending { turn: Uuid, cancel: CancellationToken },
    Failed(String),
}

#[derive(Debug)]
struct ChatState {
    transcript: Transcript,
    profile: Option<Profile>,
    session: SessionPhase,
    send: SendPhase,
    summary: Option<CancellationToken>,
    generation: u64,
    summary_error: Option<String>,
}

impl ChatState {
    fn new() -> Self {
        Self {
            transcript: Transcript::new(),
            profile: None,
            session: SessionPhase::Idle,
            send: SendPhase::Idle,
            summary: None,
            generation: 0,
            summary_error: None,
        }
    }

    /// Drop everything and move to a new generation.
    fn discard(&mut self) -> u64 {
        if let SendPhase::Sending { cancel, .. } = &self.send {
            cancel.cancel();
        }
        self.generation += 1;
        self.transcript.clear();
        self.profile = None;
        self.session = SessionPhase::Idle;
        self.send = SendPhase::Idle;
        if let Some(cancel) = self.summary.take() {
            cancel.cancel();
        }
        self.summary_error = None;
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Initializing,
    Ready,
    Failed,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStatus {
    pub configured: bool,
    pub session: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub sending: bool,
    /// Assistant turn receiving the in-flight reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_turn: Option<Uuid>,
    pub summarizing: bool,
    pub turns: usize,
    pub personalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub struct ChatController {
    service: Option<Arc<dyn ConversationService>>,
    state: Mutex<ChatState>,
    transcript_tx: watch::Sender<Transcript>,
    notifier: Notifier,
}

impl ChatController {
    pub fn new(service: Arc<dyn ConversationService>, notifications: &NotificationConfig) -> Self {
        Self::build(Some(service), notifications)
    }

    /// A controller with no credential. Starting a session reports the
    /// configuration error; nothing else can run.
    pub fn unconfigured(notifications: &NotificationConfig) -> Self {
        Self::build(None, notifications)
    }

    pub fn from_config(config: &TrackwiseConfig) -> Result<Self, TrackwiseError> {
        match GeminiConversationClient::from_model_config(&config.model) {
            Ok(client) => Ok(Self::new(Arc::new(client), &config.notifications)),
            Err(ServiceError::MissingApiKey) => {
                tracing::warn!(
                    env = %config.model.api_key_env,
                    "No API key set, chat will be unavailable"
                );
                Ok(Self::unconfigured(&config.notifications))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn build(
        service: Option<Arc<dyn ConversationService>>,
        notifications: &NotificationConfig,
    ) -> Self {
        let (transcript_tx, _rx) = watch::channel(Transcript::new());
        Self {
            service,
            state: Mutex::new(ChatState::new()),
            transcript_tx,
            notifier: Notifier::new(Duration::from_millis(notifications.default_duration_ms)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish(&self, state: &ChatState) {
        self.transcript_tx.send_replace(state.transcript.clone());
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Discard any previous chat and open a new session for `profile`.
    pub async fn start_session(
        &self,
        profile: Option<Profile>,
    ) -> Result<SessionHandle, ChatError> {
        let generation = {
            let mut state = self.lock();
            if matches!(state.session, SessionPhase::Initializing) {
                return Err(ChatError::Busy);
            }
            let generation = state.discard();
            state.profile = profile.clone();
            state.session = SessionPhase::Initializing;
            self.publish(&state);
            generation
        };
        self.notifier.clear();

        let opened = match &self.service {
            Some(service) => session::open_session(service.as_ref(), profile.as_ref()).await,
            None => Err(ChatError::Configuration),
        };

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(generation, "Session start superseded by reset");
            return Err(ChatError::Cancelled);
        }

        match opened {
            Ok((handle, greeting)) => {
                state.transcript.push(greeting);
                state.session = SessionPhase::Ready(handle.clone());
                self.publish(&state);
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to start chat session");
                state.transcript.push(session::failure_notice(&e));
                state.session = SessionPhase::Failed(e.user_message());
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// Discard transcript, profile and session in one step.
    pub fn reset(&self) {
        let generation = {
            let mut state = self.lock();
            let generation = state.discard();
            self.publish(&state);
            generation
        };
        self.notifier.clear();
        tracing::info!(generation, "Chat reset");
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send one user turn and stream the reply into the transcript.
    ///
    /// Refuses without touching state when there is no live session, when a
    /// send is already in flight, or when `text` is blank.
    pub async fn send_turn(&self, text: &str) -> Result<String, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let service = self.service.clone().ok_or(ChatError::NotReady)?;

        let (handle, turn, cancel, generation) = {
            let mut state = self.lock();
            let handle = match &state.session {
                SessionPhase::Ready(handle) => handle.clone(),
                _ => return Err(ChatError::NotReady),
            };
            if matches!(state.send, SendPhase::Sending { .. }) {
                return Err(ChatError::Busy);
            }
            if state.transcript.streaming_turn().is_some() {
                return Err(ChatError::Busy);
            }

            state.transcript.push(Turn::user(text));
            let turn = state
                .transcript
                .begin_reply()
                .ok_or(ChatError::Busy)?;
            let cancel = CancellationToken::new();
            state.send = SendPhase::Sending {
                turn,
                cancel: cancel.clone(),
            };
            self.publish(&state);
            (handle, turn, cancel, state.generation)
        };

        tracing::debug!(session = %handle.id(), turn = %turn, "Sending user turn");

        if text.trim() == DOCTOR_DISCUSSION_PHRASE {
            self.notifier.show(MARKER_NOTICE, MARKER_NOTICE_DURATION);
        }

        let outcome = assembler::stream_reply(service.as_ref(), &handle, text, &cancel, |partial| {
            let mut state = self.lock();
            if state.generation != generation {
                return false;
            }
            let applied = state.transcript.update_streaming(turn, partial);
            if applied {
                self.publish(&state);
            }
            applied
        })
        .await;

        let mut state = self.lock();
        if state.generation != generation {
            return Err(ChatError::Cancelled);
        }

        match outcome {
            StreamOutcome::Completed(reply) => {
                state.transcript.finish_streaming(turn, reply.clone());
                state.send = SendPhase::Idle;
                self.publish(&state);
                tracing::info!(turn = %turn, chars = reply.len(), "Reply complete");
                Ok(reply)
            }
            StreamOutcome::Failed(e) => {
                let err = ChatError::Stream(e);
                tracing::error!(turn = %turn, error = %err, "Reply failed");
                state.transcript.finish_streaming(turn, STREAM_APOLOGY);
                state.send = SendPhase::Failed(err.user_message());
                self.publish(&state);
                Err(err)
            }
            StreamOutcome::Cancelled => {
                state.transcript.finish_streaming(turn, STREAM_APOLOGY);
                state.send = SendPhase::Idle;
                self.publish(&state);
                Err(ChatError::Cancelled)
            }
        }
    }

    /// Send the fixed phrase that marks this point for the user's doctor.
    pub async fn mark_for_doctor(&self) -> Result<String, ChatError> {
        self.send_turn(DOCTOR_DISCUSSION_PHRASE).await
    }

    /// Note a turn the user wants to raise with their doctor.
    ///
    /// Returns `false` if no turn has that id. Safe to call outside a tokio
    /// runtime; the notice then stays until replaced or cleared.
    pub fn flag_turn(&self, id: Uuid) -> bool {
        let flagged = {
            let state = self.lock();
            state
                .transcript
                .get(id)
                .map(|t| (t.sender, t.text.chars().take(80).collect::<String>()))
        };

        match flagged {
            Some((sender, preview)) => {
                tracing::info!(turn = %id, ?sender, preview = %preview, "Turn flagged for doctor");
                self.notifier.show_default(FLAG_NOTICE);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Summary
    // ------------------------------------------------------------------

    /// Summarize the current transcript. Leaves the transcript untouched.
    pub async fn summarize(&self) -> Result<SummaryOutcome, ChatError> {
        let (snapshot, cancel, generation) = {
            let mut state = self.lock();
            if state.summary.is_some() {
                return Err(ChatError::Busy);
            }
            let cancel = CancellationToken::new();
            state.summary = Some(cancel.clone());
            state.summary_error = None;
            (state.transcript.clone(), cancel, state.generation)
        };
        let _guard = SummarySlot {
            controller: self,
            generation,
        };

        let result = match &self.service {
            Some(service) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ChatError::Cancelled),
                result = summary::summarize(service.as_ref(), &snapshot) => result,
            },
            None if snapshot.len() <= 1 => Ok(SummaryOutcome::TooShort),
            None => Err(ChatError::Configuration),
        };

        if self.lock().generation != generation {
            return Err(ChatError::Cancelled);
        }

        match &result {
            Ok(SummaryOutcome::Ready(s)) => {
                tracing::info!(chars = s.text.len(), "Summary ready");
            }
            Ok(outcome) => {
                let duration = match outcome {
                    SummaryOutcome::TooShort => TOO_SHORT_NOTICE_DURATION,
                    _ => self.notifier.default_duration(),
                };
                if let Some(notice) = outcome.notice() {
                    self.notifier.show(notice, duration);
                }
            }
            Err(e) => {
                let message = e.user_message();
                tracing::error!(error = %e, "Summary failed");
                self.notifier
                    .show(format!("Error: {}", message), ERROR_NOTICE_DURATION);
                self.lock().summary_error = Some(format!("Failed to generate summary: {}", message));
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> Transcript {
        self.lock().transcript.clone()
    }

    /// Receiver that sees every transcript update, including each fragment.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.transcript_tx.subscribe()
    }

    pub fn notifications(&self) -> &Notifier {
        &self.notifier
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    pub fn status(&self) -> ChatStatus {
        let state = self.lock();
        let (session, session_id) = match &state.session {
            SessionPhase::Idle => (SessionState::Idle, None),
            SessionPhase::Initializing => (SessionState::Initializing, None),
            SessionPhase::Ready(handle) => (SessionState::Ready, Some(handle.id())),
            SessionPhase::Failed(_) => (SessionState::Failed, None),
        };
        let last_error = match (&state.send, &state.session) {
            (SendPhase::Failed(message), _) | (_, SessionPhase::Failed(message)) => {
                Some(message.clone())
            }
            _ => state.summary_error.clone(),
        };

        ChatStatus {
            configured: self.service.is_some(),
            session,
            session_id,
            sending: matches!(state.send, SendPhase::Sending { .. }),
            reply_turn: match &state.send {
                SendPhase::Sending { turn, .. } => Some(*turn),
                _ => None,
            },
            summarizing: state.summary.is_some(),
            turns: state.transcript.len(),
            personalized: state.profile.is_some(),
            last_error,
        }
    }
}

/// Releases the summary slot when a summary ends, unless a reset already did.
struct SummarySlot<'a> {
    controller: &'a ChatController,
    generation: u64,
}

impl Drop for SummarySlot<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.lock();
        if state.generation == self.generation {
            state.summary = None;
        }
    }
}
