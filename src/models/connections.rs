use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

/// A proposed connection for a canonical pair. requester_id/requested_id
/// are assigned in canonical order at creation time; the "requester" role
/// is an artifact of pair ordering, not of who triggered the scan. Each
/// party's acceptance timestamp is written independently and never unset.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConnectionRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub requested_id: Uuid,
    pub status: RequestStatus,
    pub requester_accepted_at: Option<DateTime<Utc>>,
    pub requested_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ConnectionRequest {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.requested_id == user_id
    }

    pub fn both_accepted(&self) -> bool {
        self.requester_accepted_at.is_some() && self.requested_accepted_at.is_some()
    }
}

/// The durable relationship for a canonical pair (user_lo < user_hi),
/// created exactly once at mutual acceptance. Unfriending deactivates the
/// row rather than deleting it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Connection {
    pub id: Uuid,
    pub user_lo: Uuid,
    pub user_hi: Uuid,
    pub connection_request_id: Uuid,
    pub is_active: bool,
    pub connected_at: DateTime<Utc>,
}

/// One of a user's active connections, shaped for the friends list.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEntry {
    pub connection_id: Uuid,
    pub other_user: UserProfile,
    pub connected_at: DateTime<Utc>,
    pub conversation_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
}

/// One of a user's open requests, shaped for the waves screen.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequestEntry {
    pub request_id: Uuid,
    pub other_user: UserProfile,
    pub is_requester: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
