pub mod profile;
pub mod session;
pub mod transcript;
pub mod turn;

pub use profile::{Profile, Sex};
pub use session::{HistoryEntry, SessionHandle};
pub use transcript::Transcript;
pub use turn::{Sender, Turn, TurnOrigin};
