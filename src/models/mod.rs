pub mod users;
pub mod encounters;
pub mod connections;
pub mod conversations;

pub use users::{User, UserProfile};
pub use encounters::{Encounter, EligiblePair, RecordOutcome, UserEncounter};
pub use connections::{
    Connection, ConnectionEntry, ConnectionRequest, PendingRequestEntry, RequestStatus,
};
pub use conversations::{
    Conversation, Message, MessageEntry, MessageHistory, MessageType, Pagination,
};
