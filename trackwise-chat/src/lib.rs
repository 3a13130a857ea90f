pub mod controller;
pub mod error;
pub mod repl;
pub mod subsystems;

pub use controller::{ChatController, ChatStatus, SessionState};
pub use error::ChatError;
pub use subsystems::summary::{Summary, SummaryOutcome};
