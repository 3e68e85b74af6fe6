use crate::models::User;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    pronouns: Option<&str>,
    bio: Option<&str>,
    photo_url: Option<&str>,
    now: DateTime<Utc>,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, pronouns, bio, photo_url, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
        RETURNING id, name, pronouns, bio, photo_url, is_active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(pronouns)
    .bind(bio)
    .bind(photo_url)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn get_user_by_id(pool: &SqlitePool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, pronouns, bio, photo_url, is_active, created_at, updated_at
        FROM users
        WHERE id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn list_users(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, pronouns, bio, photo_url, is_active, created_at, updated_at
        FROM users
        WHERE is_active = 1
        ORDER BY created_at DESC
        LIMIT ?1 OFFSET ?2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Patch update: absent fields keep their current value.
pub async fn update_user(
    pool: &SqlitePool,
    user_id: Uuid,
    name: Option<&str>,
    pronouns: Option<&str>,
    bio: Option<&str>,
    photo_url: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = COALESCE(?2, name),
            pronouns = COALESCE(?3, pronouns),
            bio = COALESCE(?4, bio),
            photo_url = COALESCE(?5, photo_url),
            updated_at = ?6
        WHERE id = ?1
        RETURNING id, name, pronouns, bio, photo_url, is_active, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(pronouns)
    .bind(bio)
    .bind(photo_url)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Coarse existence check used before recording an encounter: how many of
/// the two ids resolve to active users.
pub async fn count_active_users(pool: &SqlitePool, user_a: Uuid, user_b: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM users
        WHERE id IN (?1, ?2) AND is_active = 1
        "#,
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
