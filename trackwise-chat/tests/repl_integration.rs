//! Terminal front end driven with scripted input.

mod support;

use futures::stream;
use support::{controller, Call, FakeService};
use tokio::sync::broadcast;
use tokio_util::codec::LinesCodecError;
use trackwise_chat::repl::run_repl;
use trackwise_core::prompts::SYSTEM_INSTRUCTION;
use trackwise_core::Profile;

fn input(lines: &[&str]) -> impl futures::Stream<Item = Result<String, LinesCodecError>> + Unpin {
    stream::iter(
        lines
            .iter()
            .map(|l| Ok::<_, LinesCodecError>(l.to_string()))
            .collect::<Vec<_>>(),
    )
}

fn created_sessions(service: &FakeService) -> Vec<String> {
    service
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::CreateSession(instructions) => Some(instructions),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_reset_asks_for_profile_again() {
    let service = FakeService::new();
    let chat = controller(&service);
    let (_tx, shutdown) = broadcast::channel(1);

    run_repl(
        chat,
        input(&["/reset", "skip"]),
        Some(Profile::new().with_name("Alex")),
        shutdown,
    )
    .await
    .unwrap();

    let sessions = created_sessions(&service);
    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].contains("The user's name is Alex."));
    assert_eq!(sessions[1], SYSTEM_INSTRUCTION);
}

#[tokio::test]
async fn test_reset_uses_newly_entered_profile() {
    let service = FakeService::new();
    let chat = controller(&service);
    let (_tx, shutdown) = broadcast::channel(1);

    run_repl(
        chat,
        input(&["/reset", "Sam", "", "", ""]),
        Some(Profile::new().with_name("Alex")),
        shutdown,
    )
    .await
    .unwrap();

    let sessions = created_sessions(&service);
    assert_eq!(sessions.len(), 2);
    assert!(sessions[1].contains("The user's name is Sam."));
    assert!(!sessions[1].contains("Alex"));
}
