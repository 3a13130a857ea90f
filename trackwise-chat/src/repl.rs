//! Terminal front end.
//!
//! Reads stdin line by line, sends chat turns on background tasks and renders
//! transcript updates as they stream in. Notices go to stderr so stdout only
//! carries the conversation.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::io::{stdin, Stdin};
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use trackwise_core::prompts::ASSISTANT_NAME;
use trackwise_core::{Profile, Sex, Transcript, TurnOrigin};
use uuid::Uuid;

use crate::controller::ChatController;
use crate::error::ChatError;
use crate::subsystems::summary::{Summary, SummaryOutcome};

const HELP: &str = "Commands: /summary, /save [dir], /doctor, /flag, /reset, /status, /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Summary,
    Save(Option<PathBuf>),
    Doctor,
    Flag,
    Reset,
    Status,
    Help,
    Quit,
    Unknown(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(Command::Say(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    let command = match name {
        "summary" => Command::Summary,
        "save" => Command::Save(arg.map(PathBuf::from)),
        "doctor" => Command::Doctor,
        "flag" => Command::Flag,
        "reset" => Command::Reset,
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

// ============================================================================
// Rendering
// ============================================================================

/// Turns transcript snapshots into terminal output, printing only what changed.
#[derive(Debug, Default)]
pub struct Renderer {
    shown: HashMap<Uuid, Shown>,
}

#[derive(Debug)]
struct Shown {
    text: String,
    streaming: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, transcript: &Transcript) -> String {
        if transcript.is_empty() {
            self.shown.clear();
            return String::new();
        }

        let mut out = String::new();
        for turn in transcript.turns() {
            // The user already sees what they typed.
            if turn.is_user() {
                self.shown.entry(turn.id).or_insert(Shown {
                    text: turn.text.clone(),
                    streaming: false,
                });
                continue;
            }

            let label = match turn.origin {
                TurnOrigin::Notice => format!("{} (notice)", ASSISTANT_NAME),
                _ => ASSISTANT_NAME.to_string(),
            };

            match self.shown.get_mut(&turn.id) {
                None => {
                    out.push_str(&format!("{}: {}", label, turn.text));
                    if !turn.is_streaming {
                        out.push('\n');
                    }
                    self.shown.insert(
                        turn.id,
                        Shown {
                            text: turn.text.clone(),
                            streaming: turn.is_streaming,
                        },
                    );
                }
                Some(shown) if shown.streaming => {
                    if let Some(delta) = turn.text.strip_prefix(shown.text.as_str()) {
                        out.push_str(delta);
                    } else {
                        // Replaced rather than extended, e.g. by the apology.
                        out.push_str(&format!("\n{}: {}", label, turn.text));
                    }
                    if !turn.is_streaming {
                        out.push('\n');
                    }
                    shown.text.clone_from(&turn.text);
                    shown.streaming = turn.is_streaming;
                }
                Some(_) => {}
            }
        }
        out
    }
}

// ============================================================================
// Profile collection
// ============================================================================

async fn prompt<S>(lines: &mut S, question: &str) -> Option<String>
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    print!("{}", question);
    std::io::stdout().flush().ok();
    match lines.next().await {
        Some(Ok(line)) => Some(line.trim().to_string()),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Failed to read input");
            None
        }
        None => None,
    }
}

/// Ask for the optional profile. Typing `skip` at the first question, or
/// closing input, starts without one.
pub async fn collect_profile<S>(lines: &mut S) -> Option<Profile>
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    println!("Tell {} a little about yourself. Everything is optional; press Enter to leave a field blank.", ASSISTANT_NAME);

    let name = prompt(lines, "Name (or 'skip'): ").await?;
    if name.eq_ignore_ascii_case("skip") {
        return None;
    }

    let age = prompt(lines, "Age: ").await.unwrap_or_default();
    let age = if age.is_empty() {
        None
    } else {
        match age.parse::<u32>() {
            Ok(age) => Some(age),
            Err(_) => {
                eprintln!("Ignoring age '{}': not a number", age);
                None
            }
        }
    };

    let sex = prompt(lines, "Sex (male / female / prefer not to say): ")
        .await
        .unwrap_or_default();
    let sex = if sex.is_empty() {
        None
    } else {
        match sex.parse::<Sex>() {
            Ok(sex) => Some(sex),
            Err(e) => {
                eprintln!("Ignoring sex: {}", e);
                None
            }
        }
    };

    let conditions = prompt(lines, "Chronic conditions: ").await.unwrap_or_default();

    Some(
        Profile::new()
            .with_name(name)
            .with_age(age)
            .with_sex(sex)
            .with_conditions(conditions),
    )
}

// ============================================================================
// Main loop
// ============================================================================

pub fn stdin_lines() -> FramedRead<Stdin, LinesCodec> {
    FramedRead::new(stdin(), LinesCodec::new())
}

pub async fn run_repl<S>(
    controller: Arc<ChatController>,
    mut lines: S,
    profile: Option<Profile>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()>
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    let render_task = {
        let mut rx = controller.subscribe();
        tokio::spawn(async move {
            let mut renderer = Renderer::new();
            loop {
                let out = renderer.render(&rx.borrow_and_update());
                if !out.is_empty() {
                    print!("{}", out);
                    std::io::stdout().flush().ok();
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    };

    let notice_task = {
        let mut rx = controller.notifications().subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let notice = rx.borrow_and_update().clone();
                if let Some(notice) = notice {
                    eprintln!("[{}]", notice);
                }
            }
        })
    };

    if let Err(e) = controller.start_session(profile).await {
        eprintln!("{}", e.user_message());
    }
    eprintln!("{}", HELP);

    let mut last_summary: Option<Summary> = None;

    loop {
        let line = tokio::select! {
            line = lines.next() => line,
            _ = shutdown.recv() => {
                tracing::info!("Shutting down chat...");
                break;
            }
        };

        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                tracing::error!(error = %e, "Input error");
                break;
            }
            None => break,
        };

        let Some(command) = parse_command(&line) else {
            continue;
        };

        match command {
            Command::Say(text) => spawn_send(&controller, text, false),
            Command::Doctor => spawn_send(&controller, String::new(), true),
            Command::Summary => match controller.summarize().await {
                Ok(SummaryOutcome::Ready(summary)) => {
                    println!("\n{}\n", summary.text);
                    last_summary = Some(summary);
                }
                Ok(_) => {}
                Err(e) if e.is_refusal() => eprintln!("{}", e.user_message()),
                Err(_) => {
                    if let Some(error) = controller.status().last_error {
                        eprintln!("{}", error);
                    }
                }
            },
            Command::Save(dir) => match &last_summary {
                Some(summary) => {
                    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
                    match summary.save_to(&dir) {
                        Ok(path) => eprintln!("Saved {}", path.display()),
                        Err(e) => eprintln!("Could not save summary: {}", e),
                    }
                }
                None => eprintln!("No summary yet. Run /summary first."),
            },
            Command::Flag => {
                let target = controller
                    .snapshot()
                    .turns()
                    .iter()
                    .rev()
                    .find(|t| !t.is_streaming && t.origin != TurnOrigin::Greeting)
                    .map(|t| t.id);
                match target {
                    Some(id) => {
                        controller.flag_turn(id);
                    }
                    None => eprintln!("Nothing to flag yet."),
                }
            }
            Command::Reset => {
                // Back to the landing questions: the old profile goes with the session.
                controller.reset();
                last_summary = None;
                println!();
                let profile = collect_profile(&mut lines).await;
                if let Err(e) = controller.start_session(profile).await {
                    eprintln!("{}", e.user_message());
                }
            }
            Command::Status => match serde_json::to_string_pretty(&controller.status()) {
                Ok(json) => eprintln!("{}", json),
                Err(e) => tracing::error!(error = %e, "Failed to serialize status"),
            },
            Command::Help => eprintln!("{}", HELP),
            Command::Quit => break,
            Command::Unknown(name) => eprintln!("Unknown command /{}. {}", name, HELP),
        }
    }

    controller.reset();
    notice_task.abort();
    render_task.abort();
    Ok(())
}

fn spawn_send(controller: &Arc<ChatController>, text: String, doctor: bool) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        let result = if doctor {
            controller.mark_for_doctor().await
        } else {
            controller.send_turn(&text).await
        };
        match result {
            Ok(_) | Err(ChatError::Cancelled) => {}
            Err(e) => eprintln!("{}", e.user_message()),
        }
    });
}
