//! Reply assembler — folds streamed fragments into the text of one turn
//!
//! Every fragment is appended to a running buffer and the whole buffer is
//! published, in arrival order, so the transcript always shows the live
//! partial reply. The caller applies the final or failed state.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use trackwise_core::{ConversationService, FragmentStream, ServiceError, SessionHandle};

#[derive(Debug)]
pub enum StreamOutcome {
    /// The provider finished; holds the full reply.
    Completed(String),
    /// The send or the stream failed. Text received so far is dropped.
    Failed(ServiceError),
    /// Cancelled, or the target turn is gone.
    Cancelled,
}

/// Send `text` on `session` and assemble the reply.
///
/// `publish` receives the accumulated text after each fragment and returns
/// `false` once the target turn no longer accepts updates.
pub async fn stream_reply<F>(
    service: &dyn ConversationService,
    session: &SessionHandle,
    text: &str,
    cancel: &CancellationToken,
    publish: F,
) -> StreamOutcome
where
    F: FnMut(&str) -> bool,
{
    let fragments = tokio::select! {
        biased;
        _ = cancel.cancelled() => return StreamOutcome::Cancelled,
        opened = service.stream_send(session, text) => opened,
    };

    match fragments {
        Ok(fragments) => accumulate(fragments, cancel, publish).await,
        Err(e) => StreamOutcome::Failed(e),
    }
}

pub async fn accumulate<F>(
    mut fragments: FragmentStream,
    cancel: &CancellationToken,
    mut publish: F,
) -> StreamOutcome
where
    F: FnMut(&str) -> bool,
{
    let mut reply = String::new();
    let mut received = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(fragments = received, "Reply stream cancelled");
                return StreamOutcome::Cancelled;
            }
            next = fragments.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                reply.push_str(&fragment);
                received += 1;
                if !publish(&reply) {
                    tracing::debug!(fragments = received, "Reply target gone, dropping stream");
                    return StreamOutcome::Cancelled;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(fragments = received, error = %e, "Reply stream failed");
                return StreamOutcome::Failed(e);
            }
            None => {
                tracing::debug!(fragments = received, chars = reply.len(), "Reply stream completed");
                return StreamOutcome::Completed(reply);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn fragments(items: Vec<Result<&str, ServiceError>>) -> FragmentStream {
        stream::iter(
            items
                .into_iter()
                .map(|r| r.map(str::to_string))
                .collect::<Vec<_>>(),
        )
        .boxed()
    }

    #[tokio::test]
    async fn test_publishes_running_text_for_every_fragment() {
        let cancel = CancellationToken::new();
        let mut published = Vec::new();

        let outcome = accumulate(
            fragments(vec![Ok("Hi"), Ok(""), Ok(" there"), Ok("!")]),
            &cancel,
            |text| {
                published.push(text.to_string());
                true
            },
        )
        .await;

        assert_eq!(published, vec!["Hi", "Hi", "Hi there", "Hi there!"]);
        match outcome {
            StreamOutcome::Completed(text) => assert_eq!(text, "Hi there!"),
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_final_text_is_concatenation() {
        let parts = ["The ", "quick ", "brown ", "fox"];
        let cancel = CancellationToken::new();
        let outcome = accumulate(
            fragments(parts.iter().map(|p| Ok(*p)).collect()),
            &cancel,
            |_| true,
        )
        .await;

        match outcome {
            StreamOutcome::Completed(text) => assert_eq!(text, parts.concat()),
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_stream_completes_with_empty_text() {
        let cancel = CancellationToken::new();
        let outcome = accumulate(fragments(vec![]), &cancel, |_| true).await;
        assert!(matches!(outcome, StreamOutcome::Completed(ref t) if t.is_empty()));
    }

    #[tokio::test]
    async fn test_error_after_partial_text() {
        let cancel = CancellationToken::new();
        let outcome = accumulate(
            fragments(vec![Ok("Partial"), Err(ServiceError::Stream("reset".into()))]),
            &cancel,
            |_| true,
        )
        .await;
        assert!(matches!(outcome, StreamOutcome::Failed(ServiceError::Stream(_))));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_pending_stream() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = accumulate(stream::pending().boxed(), &cancel, |_| true).await;
        assert!(matches!(outcome, StreamOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_rejected_publish_stops_assembly() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let outcome = accumulate(fragments(vec![Ok("a"), Ok("b")]), &cancel, |_| {
            calls += 1;
            false
        })
        .await;
        assert_eq!(calls, 1);
        assert!(matches!(outcome, StreamOutcome::Cancelled));
    }
}
