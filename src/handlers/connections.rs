use axum::{extract::{Path, State}, response::Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::services::matching::{self, RespondOutcome};

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub user_id: Uuid,
    pub accept: bool,
}

/// POST /api/connections/create-requests
pub async fn create_requests(
    State((pool, config)): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let creation = matching::create_requests(
        &pool,
        Utc::now(),
        config.encounter_window_days,
        config.min_encounter_count,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Created {} connection request(s)", creation.created),
        "data": creation,
    })))
}

/// PATCH /api/connections/requests/{request_id}/respond
pub async fn respond_to_request(
    State((pool, _config)): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = matching::respond(&pool, request_id, req.user_id, req.accept, Utc::now()).await?;

    let body = match outcome {
        RespondOutcome::Rejected => json!({
            "success": true,
            "message": "Connection request rejected",
            "data": null,
        }),
        RespondOutcome::Waiting { request_id, status } => json!({
            "success": true,
            "message": "Request accepted, waiting for other user",
            "data": {
                "request_id": request_id,
                "status": status,
            },
        }),
        RespondOutcome::Established {
            connection_id,
            conversation_id,
            already_existed,
        } => {
            let message = if already_existed {
                "Connection already exists"
            } else {
                "Connection established successfully"
            };
            json!({
                "success": true,
                "message": message,
                "data": {
                    "connection_id": connection_id,
                    "conversation_id": conversation_id,
                },
            })
        }
    };

    Ok(Json(body))
}

/// GET /api/connections/user/{user_id}
pub async fn list_connections(
    State((pool, _config)): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let connections = db::connections::list_user_connections(&pool, user_id).await?;
    let count = connections.len();

    Ok(Json(json!({
        "success": true,
        "data": connections,
        "count": count,
    })))
}

/// GET /api/connections/pending/{user_id}
pub async fn list_pending(
    State((pool, _config)): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let requests = db::requests::list_pending_for_user(&pool, user_id).await?;
    let count = requests.len();

    Ok(Json(json!({
        "success": true,
        "data": requests,
        "count": count,
    })))
}
