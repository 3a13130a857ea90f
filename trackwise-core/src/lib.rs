pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod prompts;

pub use config::TrackwiseConfig;
pub use error::TrackwiseError;
pub use gemini::{
    ConversationService, FragmentStream, GeminiConfig, GeminiConversationClient, ServiceError,
};
pub use models::{HistoryEntry, Profile, SessionHandle, Sender, Sex, Transcript, Turn, TurnOrigin};
