use crate::constants::{DEFAULT_MESSAGE_PAGE_SIZE, MESSAGE_MAX_CHARS, MESSAGE_PREVIEW_CHARS};
use crate::db;
use crate::error::ApiError;
use crate::models::{Message, MessageHistory, MessageType, Pagination};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Trims and bounds message content. Rejects empty-after-trim and
/// over-length content before any store access.
fn validate_content(content: &str) -> Result<&str, ApiError> {
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Err(ApiError::Validation("Message content is empty".to_string()));
    }
    if trimmed.chars().count() > MESSAGE_MAX_CHARS {
        return Err(ApiError::Validation(format!(
            "Message content exceeds {} characters",
            MESSAGE_MAX_CHARS
        )));
    }

    Ok(trimmed)
}

/// First 100 characters of a message, kept on the conversation for feed
/// rendering.
fn preview_of(content: &str) -> String {
    content.chars().take(MESSAGE_PREVIEW_CHARS).collect()
}

pub async fn send_message(
    pool: &SqlitePool,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    message_type: MessageType,
    now: DateTime<Utc>,
) -> Result<Message, ApiError> {
    let content = validate_content(content)?;

    let context = db::conversations::get_conversation_context(pool, conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;

    if !context.connection_active {
        return Err(ApiError::InvalidState(
            "Connection is not active".to_string(),
        ));
    }

    if !context.is_participant(sender_id) {
        return Err(ApiError::Forbidden(
            "User is not part of this conversation".to_string(),
        ));
    }

    let message =
        db::conversations::insert_message(pool, conversation_id, sender_id, content, message_type, now)
            .await?;

    // Secondary write; the preview is derived state and tolerates not
    // being atomic with the insert.
    db::conversations::touch_last_message(pool, conversation_id, message.created_at, &preview_of(content))
        .await?;

    Ok(message)
}

pub async fn conversation_history(
    pool: &SqlitePool,
    conversation_id: Uuid,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<MessageHistory, ApiError> {
    let limit = match limit {
        Some(l) if l > 0 => l,
        _ => DEFAULT_MESSAGE_PAGE_SIZE,
    };
    let offset = offset.unwrap_or(0).max(0);

    db::conversations::get_conversation(pool, conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;

    let mut messages =
        db::conversations::list_messages(pool, conversation_id, limit, offset).await?;
    let total = db::conversations::count_messages(pool, conversation_id).await?;

    // Stored newest-first for paging; shown oldest-first.
    messages.reverse();

    Ok(MessageHistory {
        messages,
        pagination: Pagination {
            limit,
            offset,
            total,
            has_more: offset + limit < total,
        },
    })
}

/// Marks every unread message from the other participant as read and
/// returns the count. A second call right after returns zero.
pub async fn mark_read(
    pool: &SqlitePool,
    conversation_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, ApiError> {
    let context = db::conversations::get_conversation_context(pool, conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;

    if !context.is_participant(user_id) {
        return Err(ApiError::Forbidden(
            "User is not part of this conversation".to_string(),
        ));
    }

    let count = db::conversations::mark_messages_read(pool, conversation_id, user_id, now).await?;
    Ok(count)
}
