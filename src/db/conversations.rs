use crate::models::{Conversation, Message, MessageEntry, MessageType, UserProfile};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str =
    "id, connection_id, last_message_at, last_message_preview, created_at";

/// Create-if-absent, keyed by the connection's unique column. Called right
/// after connection establishment and safe to call again: a concurrent or
/// repeated upsert lands on the existing row.
pub async fn upsert_for_connection(
    pool: &SqlitePool,
    connection_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Conversation> {
    sqlx::query(
        r#"
        INSERT INTO conversations (id, connection_id, created_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (connection_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(connection_id)
    .bind(now)
    .execute(pool)
    .await?;

    let conversation = sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE connection_id = ?1"
    ))
    .bind(connection_id)
    .fetch_one(pool)
    .await?;

    Ok(conversation)
}

pub async fn get_conversation(
    pool: &SqlitePool,
    conversation_id: Uuid,
) -> Result<Option<Conversation>> {
    let conversation = sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
    ))
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    Ok(conversation)
}

/// A conversation joined with its owning connection, enough to authorize
/// senders and readers without a second lookup.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationContext {
    pub conversation_id: Uuid,
    pub connection_id: Uuid,
    pub user_lo: Uuid,
    pub user_hi: Uuid,
    pub connection_active: bool,
}

impl ConversationContext {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.user_lo == user_id || self.user_hi == user_id
    }
}

pub async fn get_conversation_context(
    pool: &SqlitePool,
    conversation_id: Uuid,
) -> Result<Option<ConversationContext>> {
    let context = sqlx::query_as::<_, ConversationContext>(
        r#"
        SELECT
            v.id AS conversation_id,
            c.id AS connection_id,
            c.user_lo,
            c.user_hi,
            c.is_active AS connection_active
        FROM conversations v
        JOIN connections c ON c.id = v.connection_id
        WHERE v.id = ?1
        "#,
    )
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    Ok(context)
}

pub async fn insert_message(
    pool: &SqlitePool,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    message_type: MessageType,
    now: DateTime<Utc>,
) -> Result<Message> {
    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (id, conversation_id, sender_id, content, message_type, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING id, conversation_id, sender_id, content, message_type, created_at, read_at, deleted_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(conversation_id)
    .bind(sender_id)
    .bind(content)
    .bind(message_type)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(message)
}

/// Secondary write behind every send: refresh the denormalized feed
/// fields. Advisory/derived state, so it is not atomic with the insert.
pub async fn touch_last_message(
    pool: &SqlitePool,
    conversation_id: Uuid,
    at: DateTime<Utc>,
    preview: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE conversations SET last_message_at = ?2, last_message_preview = ?3 WHERE id = ?1",
    )
    .bind(conversation_id)
    .bind(at)
    .bind(preview)
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(FromRow)]
struct MessageEntryRow {
    id: Uuid,
    conversation_id: Uuid,
    content: String,
    message_type: MessageType,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
    sender_id: Uuid,
    sender_name: String,
    sender_pronouns: Option<String>,
    sender_photo_url: Option<String>,
}

/// One page of non-deleted messages, newest first from storage; the
/// service reverses them for display.
pub async fn list_messages(
    pool: &SqlitePool,
    conversation_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<MessageEntry>> {
    let rows = sqlx::query_as::<_, MessageEntryRow>(
        r#"
        SELECT
            m.id,
            m.conversation_id,
            m.content,
            m.message_type,
            m.created_at,
            m.read_at,
            u.id AS sender_id,
            u.name AS sender_name,
            u.pronouns AS sender_pronouns,
            u.photo_url AS sender_photo_url
        FROM messages m
        JOIN users u ON u.id = m.sender_id
        WHERE m.conversation_id = ?1
          AND m.deleted_at IS NULL
        ORDER BY m.created_at DESC
        LIMIT ?2 OFFSET ?3
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let messages = rows
        .into_iter()
        .map(|row| MessageEntry {
            id: row.id,
            conversation_id: row.conversation_id,
            content: row.content,
            message_type: row.message_type,
            created_at: row.created_at,
            read_at: row.read_at,
            sender: UserProfile {
                id: row.sender_id,
                name: row.sender_name,
                pronouns: row.sender_pronouns,
                photo_url: row.sender_photo_url,
            },
        })
        .collect();

    Ok(messages)
}

pub async fn count_messages(pool: &SqlitePool, conversation_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND deleted_at IS NULL",
    )
    .bind(conversation_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Stamps read_at on every unread message authored by the other
/// participant. Idempotent: a second pass mutates zero rows.
pub async fn mark_messages_read(
    pool: &SqlitePool,
    conversation_id: Uuid,
    reader_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET read_at = ?3
        WHERE conversation_id = ?1
          AND sender_id != ?2
          AND read_at IS NULL
        "#,
    )
    .bind(conversation_id)
    .bind(reader_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
