use axum::{extract::{Path, Query, State}, http::StatusCode, response::Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::MessageType;
use crate::services::chat;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub user_id: Uuid,
}

/// POST /api/messages
pub async fn send_message(
    State((pool, _config)): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let message = chat::send_message(
        &pool,
        req.conversation_id,
        req.sender_id,
        &req.content,
        req.message_type,
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Message sent successfully",
            "data": message,
        })),
    ))
}

/// GET /api/messages/conversation/{conversation_id}
pub async fn get_history(
    State((pool, _config)): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let history =
        chat::conversation_history(&pool, conversation_id, query.limit, query.offset).await?;

    Ok(Json(json!({
        "success": true,
        "data": history.messages,
        "pagination": history.pagination,
    })))
}

/// PATCH /api/messages/conversation/{conversation_id}/read
pub async fn mark_read(
    State((pool, _config)): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<Value>, ApiError> {
    let count = chat::mark_read(&pool, conversation_id, req.user_id, Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Marked {} message(s) as read", count),
        "data": { "count": count },
    })))
}
