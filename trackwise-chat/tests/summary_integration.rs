//! Summary requests against a live chat.

mod support;

use std::sync::Arc;

use support::{controller, wait_until_sending, FakeService, Reply, SummaryReply};
use trackwise_chat::subsystems::summary;
use trackwise_chat::{ChatError, SummaryOutcome};
use trackwise_core::prompts::{SUMMARY_INSTRUCTION, SUMMARY_NOTHING_TO_SUMMARIZE, SUMMARY_TOO_SHORT};
use trackwise_core::{Profile, ServiceError, Transcript, Turn};

#[tokio::test]
async fn test_greeting_only_is_too_short() {
    let service = FakeService::new();
    let chat = controller(&service);
    chat.start_session(None).await.unwrap();

    let outcome = chat.summarize().await.unwrap();
    assert_eq!(outcome, SummaryOutcome::TooShort);
    assert!(service.generate_calls().is_empty());
    assert_eq!(chat.notifications().current().as_deref(), Some(SUMMARY_TOO_SHORT));
}

#[tokio::test]
async fn test_summary_excludes_greeting_and_pending_placeholder() {
    let service = FakeService::new();
    service.push_reply(Reply::Fragments(vec!["That sounds ", "hard."]));
    service.push_reply(Reply::Pending);
    service.push_summary(SummaryReply::Text("Summary of your conversation with TrackWise:"));
    let chat = controller(&service);

    chat.start_session(Some(Profile::new().with_name("Alex")))
        .await
        .unwrap();
    chat.send_turn("Hi there, my asthma flared up").await.unwrap();

    let pending = tokio::spawn({
        let chat = Arc::clone(&chat);
        async move { chat.send_turn("Another question").await }
    });
    wait_until_sending(&chat).await;

    let before = chat.snapshot();
    let outcome = chat.summarize().await.unwrap();
    match outcome {
        SummaryOutcome::Ready(s) => {
            assert_eq!(s.text, "Summary of your conversation with TrackWise:")
        }
        other => panic!("Expected Ready, got {:?}", other),
    }

    let calls = service.generate_calls();
    assert_eq!(calls.len(), 1);
    let (instructions, content) = &calls[0];
    assert_eq!(instructions, SUMMARY_INSTRUCTION);
    assert_eq!(
        content,
        "Conversation Transcript:\n\n\
         User: Hi there, my asthma flared up\n\
         TrackWise: That sounds hard.\n\
         User: Another question\n"
    );
    assert_eq!(chat.snapshot(), before);

    chat.reset();
    assert!(matches!(pending.await.unwrap(), Err(ChatError::Cancelled)));
}

#[tokio::test]
async fn test_empty_response_is_an_error_and_leaves_transcript_alone() {
    let service = FakeService::new();
    service.push_summary(SummaryReply::Text("   "));
    let chat = controller(&service);
    chat.start_session(None).await.unwrap();
    chat.send_turn("Hello").await.unwrap();

    let before = chat.snapshot();
    let err = chat.summarize().await.unwrap_err();
    assert!(matches!(err, ChatError::Summary(ServiceError::EmptyResponse)));
    assert_eq!(chat.snapshot(), before);

    assert_eq!(
        chat.notifications().current().as_deref(),
        Some("Error: Failed to generate a valid summary from the AI.")
    );
    assert_eq!(
        chat.status().last_error.as_deref(),
        Some("Failed to generate summary: Failed to generate a valid summary from the AI.")
    );
}

#[tokio::test]
async fn test_service_failure_is_reported() {
    let service = FakeService::new();
    service.push_summary(SummaryReply::Fail(ServiceError::Auth("API key not valid".into())));
    let chat = controller(&service);
    chat.start_session(None).await.unwrap();
    chat.send_turn("Hello").await.unwrap();

    let err = chat.summarize().await.unwrap_err();
    assert_eq!(
        err.user_message(),
        "Summary generation failed due to invalid API Key."
    );

    // A later attempt can succeed and clears the error.
    let outcome = chat.summarize().await.unwrap();
    assert!(matches!(outcome, SummaryOutcome::Ready(_)));
    assert!(chat.status().last_error.is_none());
}

#[tokio::test]
async fn test_concurrent_summary_is_refused() {
    let service = FakeService::new();
    service.push_summary(SummaryReply::Pending);
    let chat = controller(&service);
    chat.start_session(None).await.unwrap();
    chat.send_turn("Hello").await.unwrap();

    let first = tokio::spawn({
        let chat = Arc::clone(&chat);
        async move { chat.summarize().await }
    });
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while !chat.status().summarizing {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("summary never started");

    assert!(matches!(chat.summarize().await, Err(ChatError::Busy)));

    chat.reset();
    assert!(matches!(first.await.unwrap(), Err(ChatError::Cancelled)));
    assert!(!chat.status().summarizing);
}

#[tokio::test]
async fn test_nothing_left_after_filtering() {
    let service = FakeService::new();
    let mut transcript = Transcript::new();
    transcript.push(Turn::greeting("Hi! I'm TrackWise"));
    transcript.begin_reply().unwrap();

    let outcome = summary::summarize(service.as_ref(), &transcript)
        .await
        .unwrap();
    assert_eq!(outcome, SummaryOutcome::NothingToSummarize);
    assert_eq!(outcome.notice(), Some(SUMMARY_NOTHING_TO_SUMMARIZE));
    assert!(service.generate_calls().is_empty());
}
