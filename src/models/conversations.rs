use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::UserProfile;

/// Exactly one conversation per connection, created lazily when the
/// connection is established. last_message_at / last_message_preview are
/// denormalized for feed rendering and updated on every send.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Location,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A message with its sender's public profile attached, as returned from
/// chat history.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEntry {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserProfile,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub has_more: bool,
}

/// One page of chat history, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessageHistory {
    pub messages: Vec<MessageEntry>,
    pub pagination: Pagination,
}
