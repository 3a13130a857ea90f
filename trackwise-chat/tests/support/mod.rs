//! Scripted in-memory conversation backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use trackwise_chat::ChatController;
use trackwise_core::config::NotificationConfig;
use trackwise_core::{ConversationService, FragmentStream, ServiceError, SessionHandle, Transcript};

/// How the next `stream_send` behaves.
pub enum Reply {
    Fragments(Vec<&'static str>),
    /// Yields the fragments, then a stream error.
    FailAfter(Vec<&'static str>),
    /// `stream_send` itself fails with an auth error.
    Reject,
    /// Never yields and never ends.
    Pending,
    /// Fragments pushed by the test through the paired sender.
    Channel(mpsc::UnboundedReceiver<Result<String, ServiceError>>),
}

/// How the next `generate_once` behaves.
pub enum SummaryReply {
    Text(&'static str),
    Fail(ServiceError),
    Pending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSession(String),
    StreamSend(String),
    GenerateOnce { instructions: String, content: String },
}

#[derive(Default)]
pub struct FakeService {
    create_error: Mutex<Option<ServiceError>>,
    replies: Mutex<VecDeque<Reply>>,
    summaries: Mutex<VecDeque<SummaryReply>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_create(&self, error: ServiceError) {
        *self.create_error.lock().unwrap() = Some(error);
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_summary(&self, reply: SummaryReply) {
        self.summaries.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stream_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::StreamSend(_)))
            .count()
    }

    pub fn generate_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::GenerateOnce {
                    instructions,
                    content,
                } => Some((instructions, content)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ConversationService for FakeService {
    async fn create_session(&self, instructions: &str) -> Result<SessionHandle, ServiceError> {
        self.record(Call::CreateSession(instructions.to_string()));
        if let Some(error) = self.create_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(SessionHandle::new(instructions))
    }

    async fn stream_send(
        &self,
        _session: &SessionHandle,
        text: &str,
    ) -> Result<FragmentStream, ServiceError> {
        self.record(Call::StreamSend(text.to_string()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Fragments(vec!["ok"]));

        let fragments = |items: Vec<&'static str>| {
            items
                .into_iter()
                .map(|s| Ok(s.to_string()))
                .collect::<Vec<Result<String, ServiceError>>>()
        };

        match reply {
            Reply::Fragments(items) => Ok(stream::iter(fragments(items)).boxed()),
            Reply::FailAfter(items) => {
                let mut items = fragments(items);
                items.push(Err(ServiceError::Stream("connection reset".into())));
                Ok(stream::iter(items).boxed())
            }
            Reply::Reject => Err(ServiceError::Auth("API key not valid".into())),
            Reply::Pending => Ok(stream::pending().boxed()),
            Reply::Channel(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
        }
    }

    async fn generate_once(
        &self,
        instructions: &str,
        content: &str,
    ) -> Result<String, ServiceError> {
        self.record(Call::GenerateOnce {
            instructions: instructions.to_string(),
            content: content.to_string(),
        });
        let reply = self
            .summaries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SummaryReply::Text("Summary"));

        match reply {
            SummaryReply::Text(text) => Ok(text.to_string()),
            SummaryReply::Fail(error) => Err(error),
            SummaryReply::Pending => futures::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn controller(service: &Arc<FakeService>) -> Arc<ChatController> {
    let service: Arc<dyn ConversationService> = service.clone();
    Arc::new(ChatController::new(service, &NotificationConfig::default()))
}

/// Poll the transcript until `pred` holds. Panics after two seconds.
pub async fn wait_for<F>(controller: &ChatController, pred: F) -> Transcript
where
    F: Fn(&Transcript) -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = controller.snapshot();
            if pred(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    waited.expect("condition not reached in time")
}

/// Wait until a send is in flight.
pub async fn wait_until_sending(controller: &ChatController) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !controller.status().sending {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("send never started");
}
