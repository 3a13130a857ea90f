//! Session subsystem — opens the remote conversation for a chat
//!
//! Responsible for:
//! - Building the instruction text (base script + optional personalization block)
//! - Creating the remote session bound to that text
//! - Producing the greeting, or the notice shown when startup fails

use trackwise_core::prompts::{
    personalized_greeting, CONFIGURATION_NOTICE, CONNECTION_NOTICE, INITIAL_GREETING,
    SYSTEM_INSTRUCTION,
};
use trackwise_core::{ConversationService, Profile, SessionHandle, Turn};

use crate::error::ChatError;

const CONTEXT_HEADER: &str = "--- User Context (Optional Information Provided by User) ---";
const CONTEXT_FOOTER: &str = "--- End of User Context ---";

/// Full instruction text for a session.
///
/// A profile, even an empty one, appends a personalization block listing only
/// the fields it has.
pub fn build_instructions(profile: Option<&Profile>) -> String {
    let mut instructions = SYSTEM_INSTRUCTION.to_string();
    if let Some(profile) = profile {
        instructions.push_str(&personalization_block(profile));
    }
    instructions
}

fn personalization_block(profile: &Profile) -> String {
    let mut block = format!("\n\n{}", CONTEXT_HEADER);

    if let Some(name) = &profile.name {
        block.push_str(&format!(
            "\nThe user's name is {name}. Please address them by their name. For example, instead of \"How can I help you?\", say \"How can I help you, {name}?\"."
        ));
    }
    if let Some(age) = profile.age {
        block.push_str(&format!("\nThe user's age is: {}.", age));
    }
    if let Some(sex) = profile.disclosed_sex() {
        block.push_str(&format!("\nThe user's sex is: {}.", sex));
    }
    if let Some(conditions) = &profile.conditions {
        block.push_str(&format!(
            "\nThe user has mentioned these chronic conditions: \"{}\". Remember, you cannot give medical advice based on this, but be aware of this context for empathetic conversation.",
            conditions
        ));
    }

    block.push('\n');
    block.push_str(CONTEXT_FOOTER);
    block
}

pub fn greeting_for(profile: Option<&Profile>) -> String {
    match profile.and_then(|p| p.name.as_deref()) {
        Some(name) => personalized_greeting(name),
        None => INITIAL_GREETING.to_string(),
    }
}

/// Create the remote session and the greeting turn that opens the transcript.
pub async fn open_session(
    service: &dyn ConversationService,
    profile: Option<&Profile>,
) -> Result<(SessionHandle, Turn), ChatError> {
    let instructions = build_instructions(profile);

    tracing::debug!(
        backend = service.name(),
        personalized = profile.is_some(),
        chars = instructions.len(),
        "Creating chat session"
    );

    let handle = service
        .create_session(&instructions)
        .await
        .map_err(ChatError::SessionCreation)?;

    let greeting = Turn::greeting(greeting_for(profile));
    tracing::info!(session = %handle.id(), "Chat session ready");
    Ok((handle, greeting))
}

/// Assistant turn shown in place of the greeting when startup fails.
pub fn failure_notice(err: &ChatError) -> Turn {
    match err {
        ChatError::Configuration => Turn::notice(CONFIGURATION_NOTICE),
        _ => Turn::notice(CONNECTION_NOTICE),
    }
}
