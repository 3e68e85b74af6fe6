use axum::{extract::{Path, Query, State}, http::StatusCode, response::Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::constants::{BIO_MAX_CHARS, DEFAULT_USER_PAGE_SIZE, NAME_MAX_CHARS, PRONOUNS_MAX_CHARS};
use crate::db;
use crate::error::ApiError;
use crate::handlers::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub pronouns: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub pronouns: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn validate_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name must not be empty".to_string()));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(ApiError::Validation(format!(
            "Name exceeds {} characters",
            NAME_MAX_CHARS
        )));
    }
    Ok(name)
}

/// Optional profile fields: trimmed, empty collapsed to absent, bounded.
fn normalize_optional(
    value: Option<&str>,
    max_chars: usize,
    field: &str,
) -> Result<Option<String>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.chars().count() > max_chars {
                return Err(ApiError::Validation(format!(
                    "{} exceeds {} characters",
                    field, max_chars
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

pub async fn create_user(
    State((pool, _config)): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = validate_name(&req.name)?;
    let pronouns = normalize_optional(req.pronouns.as_deref(), PRONOUNS_MAX_CHARS, "Pronouns")?;
    let bio = normalize_optional(req.bio.as_deref(), BIO_MAX_CHARS, "Bio")?;
    let photo_url = req.photo_url.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let user = db::users::create_user(
        &pool,
        name,
        pronouns.as_deref(),
        bio.as_deref(),
        photo_url,
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "data": user,
        })),
    ))
}

pub async fn get_user(
    State((pool, _config)): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let user = db::users::get_user_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": user,
    })))
}

pub async fn list_users(
    State((pool, _config)): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_USER_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let users = db::users::list_users(&pool, limit, offset).await?;
    let count = users.len();

    Ok(Json(json!({
        "success": true,
        "data": users,
        "count": count,
    })))
}

pub async fn update_user(
    State((pool, _config)): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = match req.name.as_deref() {
        Some(raw) => Some(validate_name(raw)?.to_string()),
        None => None,
    };
    let pronouns = normalize_optional(req.pronouns.as_deref(), PRONOUNS_MAX_CHARS, "Pronouns")?;
    let bio = normalize_optional(req.bio.as_deref(), BIO_MAX_CHARS, "Bio")?;
    let photo_url = req.photo_url.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let user = db::users::update_user(
        &pool,
        user_id,
        name.as_deref(),
        pronouns.as_deref(),
        bio.as_deref(),
        photo_url,
        Utc::now(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
        "data": user,
    })))
}
