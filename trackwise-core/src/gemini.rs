//! Conversation backend — the remote model service behind a chat session
//!
//! Provides a `ConversationService` trait with three operations:
//! - **create_session** — bind a new conversation context to an instruction script
//! - **stream_send** — send a user turn and receive the reply as ordered text fragments
//! - **generate_once** — one-shot generation under a separate instruction set
//!
//! `GeminiConversationClient` implements it over the Gemini v1beta REST API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::config::ModelConfig;
use crate::models::{HistoryEntry, Sender, SessionHandle};

/// Longest SSE line accepted from the stream; longer lines fail the reply.
pub const MAX_EVENT_LINE_BYTES: usize = 1024 * 1024;

/// Lazy, finite, non-restartable sequence of reply fragments for one send.
pub type FragmentStream = BoxStream<'static, Result<String, ServiceError>>;

// ============================================================================
// ConversationService trait
// ============================================================================

/// Abstraction over the hosted model service.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Create a conversation context bound to `instructions`.
    async fn create_session(&self, instructions: &str) -> Result<SessionHandle, ServiceError>;

    /// Send a user turn. Fragments arrive in provider order; the stream ends
    /// when the provider signals completion or yields an error.
    async fn stream_send(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<FragmentStream, ServiceError>;

    /// One-shot generation outside any session.
    async fn generate_once(&self, instructions: &str, content: &str)
        -> Result<String, ServiceError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("API key rejected: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Empty response from model")]
    EmptyResponse,
}

impl ServiceError {
    /// Map a provider error to `Auth` when it is about credentials.
    pub fn from_api(code: u16, message: String) -> Self {
        if code == 401 || code == 403 || message.contains("API key not valid") {
            ServiceError::Auth(message)
        } else {
            ServiceError::Api { code, message }
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ServiceError::MissingApiKey | ServiceError::Auth(_))
    }

    /// Worth retrying: transport hiccups, rate limits and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ServiceError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Config types
// ============================================================================

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub verify_on_create: bool,
}

impl GeminiConfig {
    pub fn from_model_config(model: &ModelConfig) -> Self {
        Self {
            api_key: model.api_key().unwrap_or_default(),
            model: model.name.clone(),
            request_timeout: Duration::from_secs(model.request_timeout_seconds),
            max_retries: model.max_retries,
            retry_delay_ms: model.retry_delay_ms,
            verify_on_create: model.verify_on_create,
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

impl Content {
    fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    fn user(text: &str) -> Self {
        Self {
            role: Some("user"),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    fn from_entry(entry: &HistoryEntry) -> Self {
        let role = match entry.sender {
            Sender::User => "user",
            Sender::Assistant => "model",
        };
        Self {
            role: Some(role),
            parts: vec![Part {
                text: entry.text.clone(),
            }],
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiConversationClient
// ============================================================================

/// Gemini chat client — calls `streamGenerateContent` and `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiConversationClient {
    client: Client,
    config: GeminiConfig,
    base_url: String,
}

impl GeminiConversationClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        Self::with_base_url(
            config,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a client with a custom base URL (for testing / proxies)
    pub fn with_base_url(config: GeminiConfig, base_url: String) -> Result<Self, ServiceError> {
        if config.api_key.is_empty() {
            return Err(ServiceError::MissingApiKey);
        }

        // No overall timeout here: it would cut long streamed replies short.
        // Non-streaming calls set their own per-request timeout.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_model_config(model: &ModelConfig) -> Result<Self, ServiceError> {
        Self::with_base_url(GeminiConfig::from_model_config(model), model.base_url.clone())
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url, self.config.model, method
        )
    }

    async fn generate_attempt(
        &self,
        instructions: &str,
        content: &str,
    ) -> Result<String, ServiceError> {
        let request = GenerateRequest {
            system_instruction: Content::system(instructions),
            contents: vec![Content::user(content)],
        };

        let response = self
            .client
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.config.api_key.as_str())])
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: GenerateResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(ServiceError::from_api(err.code, err.message));
        }

        let text = body.text();
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl ConversationService for GeminiConversationClient {
    async fn create_session(&self, instructions: &str) -> Result<SessionHandle, ServiceError> {
        if self.config.verify_on_create {
            let url = format!("{}/models/{}", self.base_url, self.config.model);
            let response = self
                .client
                .get(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .timeout(self.config.request_timeout)
                .send()
                .await?;
            check_status(response).await?;
        }

        let handle = SessionHandle::new(instructions);
        tracing::info!(
            session = %handle.id(),
            model = %self.config.model,
            "Created Gemini chat session"
        );
        Ok(handle)
    }

    async fn stream_send(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<FragmentStream, ServiceError> {
        let mut contents: Vec<Content> = session.history().iter().map(Content::from_entry).collect();
        contents.push(Content::user(text));

        let request = GenerateRequest {
            system_instruction: Content::system(session.instructions()),
            contents,
        };

        let response = self
            .client
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        tracing::debug!(session = %session.id(), "Gemini stream opened");

        let body: BoxStream<'static, std::io::Result<Bytes>> = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();
        let lines = FramedRead::new(
            StreamReader::new(body),
            LinesCodec::new_with_max_length(MAX_EVENT_LINE_BYTES),
        );

        Ok(sse_fragments(lines, session.clone(), text.to_string()))
    }

    async fn generate_once(
        &self,
        instructions: &str,
        content: &str,
    ) -> Result<String, ServiceError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = RetryIf::start(
            retry_strategy,
            || self.generate_attempt(instructions, content),
            |e: &ServiceError| e.is_transient(),
        )
        .await;

        if let Err(e) = &result {
            tracing::error!(
                max_retries = self.config.max_retries,
                error = %e,
                "Gemini generateContent failed"
            );
        }
        result
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Turn a non-2xx response into a `ServiceError`, preferring the provider's
/// own error code and message when the body carries them.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let error_detail = serde_json::from_str::<ErrorResponse>(&error_body)
        .ok()
        .and_then(|e| e.error);

    let (code, message) = error_detail
        .map(|e| (e.code, e.message))
        .unwrap_or((status.as_u16(), error_body));

    tracing::error!(code = code, message = %message, "Gemini API error");

    Err(ServiceError::from_api(code, message))
}

// ============================================================================
// Server-sent event parsing
// ============================================================================

struct SseState<S> {
    lines: S,
    session: SessionHandle,
    prompt: String,
    reply: String,
}

/// Adapt SSE lines into reply fragments. The exchange is recorded in the
/// session history only when the stream ends without error and with text;
/// the provider rejects history holding an empty model turn.
fn sse_fragments<S>(lines: S, session: SessionHandle, prompt: String) -> FragmentStream
where
    S: Stream<Item = Result<String, LinesCodecError>> + Send + Unpin + 'static,
{
    let state = SseState {
        lines,
        session,
        prompt,
        reply: String::new(),
    };

    stream::try_unfold(state, |mut state| async move {
        while let Some(line) = state.lines.next().await {
            let line = line.map_err(|e| ServiceError::Stream(e.to_string()))?;
            if let Some(fragment) = parse_event_line(&line)? {
                state.reply.push_str(&fragment);
                return Ok(Some((fragment, state)));
            }
        }

        if state.reply.trim().is_empty() {
            tracing::warn!(
                session = %state.session.id(),
                "Gemini stream completed without text, exchange not kept"
            );
            return Ok(None);
        }
        state.session.record_exchange(&state.prompt, &state.reply);
        tracing::debug!(
            session = %state.session.id(),
            chars = state.reply.len(),
            "Gemini stream completed"
        );
        Ok::<_, ServiceError>(None)
    })
    .boxed()
}

/// Parse one SSE line. Only `data:` lines carry events; an event without
/// text yields an empty fragment.
fn parse_event_line(line: &str) -> Result<Option<String>, ServiceError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let event: GenerateResponse = serde_json::from_str(data)
        .map_err(|e| ServiceError::Stream(format!("malformed event: {}", e)))?;
    if let Some(err) = event.error {
        return Err(ServiceError::from_api(err.code, err.message));
    }
    Ok(Some(event.text()))
}

// ============================================================================
// TESTS
// ============================================================================
