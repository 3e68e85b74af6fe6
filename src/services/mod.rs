pub mod encounters;
pub mod matching;
pub mod chat;

pub use matching::{RequestCreation, RespondOutcome};
