//! Fixed texts: model instructions, greetings, and user-facing messages.

/// Display name of the assistant; also the transcript label for its turns.
pub const ASSISTANT_NAME: &str = "TrackWise";

/// Base behaviour script for live chat sessions.
pub const SYSTEM_INSTRUCTION: &str = include_str!("../prompts/system_instruction.md");

/// Instruction set for the one-shot conversation summary.
pub const SUMMARY_INSTRUCTION: &str = include_str!("../prompts/summary_instruction.md");

/// Phrase the user sends to mark a point for their doctor.
pub const DOCTOR_DISCUSSION_PHRASE: &str =
    "TrackWise, I want to make sure I discuss the recent part of our conversation with my doctor.";

const GREETING_BODY: &str = "I'm TrackWise, your friendly companion for your health journey. If you're managing a chronic condition or the stress that comes with it, I'm here to listen and share info. How can I help today? (Quick reminder: I'm for general support, not medical advice – always best to chat with your doctor or GP for that!)";

/// Greeting used when no name was shared.
pub const INITIAL_GREETING: &str = "Hi! I'm TrackWise, your friendly companion for your health journey. If you're managing a chronic condition or the stress that comes with it, I'm here to listen and share info. How can I help today? (Quick reminder: I'm for general support, not medical advice – always best to chat with your doctor or GP for that!)";

pub fn personalized_greeting(name: &str) -> String {
    format!("Hi {}! {}", name, GREETING_BODY)
}

pub const API_KEY_ERROR_MESSAGE: &str = "Failed to initialize the AI service. Please ensure the API key is configured correctly. This is a development placeholder, and a real API key needs to be set up in the environment.";

// Synthetic assistant turns shown after a failure.
pub const CONFIGURATION_NOTICE: &str = "I'm having trouble starting up due to a configuration issue. Please ensure the API key is set up correctly if you are a developer.";
pub const CONNECTION_NOTICE: &str = "I'm having a little trouble connecting right now. Please check your setup or try again in a moment.";
pub const STREAM_APOLOGY: &str =
    "Oh dear, I seem to have hit a snag. Could you try sending that again?";

pub const SUMMARY_TOO_SHORT: &str = "Chat is too short to summarize.";
pub const SUMMARY_NOTHING_TO_SUMMARIZE: &str =
    "There isn't enough conversation to summarize effectively.";

pub const MARKER_NOTICE: &str =
    "Marker added to chat. Please remember to discuss this with your doctor.";
pub const FLAG_NOTICE: &str = "Message noted! Remember to discuss important points with your doctor or therapist during your next consultation.";

/// Header line of the transcript handed to the summarizer.
pub const TRANSCRIPT_HEADER: &str = "Conversation Transcript:";
