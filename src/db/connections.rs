use crate::models::{Connection, ConnectionEntry, UserProfile};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Inserts the durable connection row for a canonical pair. Returns `None`
/// when the pair's unique constraint fires: two callers observing mutual
/// acceptance at the same time race on this insert, and the loser fetches
/// the winner's row instead of failing.
pub async fn insert_connection(
    pool: &SqlitePool,
    user_lo: Uuid,
    user_hi: Uuid,
    connection_request_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Connection>> {
    let result = sqlx::query_as::<_, Connection>(
        r#"
        INSERT INTO connections (id, user_lo, user_hi, connection_request_id, is_active, connected_at)
        VALUES (?1, ?2, ?3, ?4, 1, ?5)
        RETURNING id, user_lo, user_hi, connection_request_id, is_active, connected_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_lo)
    .bind(user_hi)
    .bind(connection_request_id)
    .bind(now)
    .fetch_one(pool)
    .await;

    match result {
        Ok(connection) => Ok(Some(connection)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_connection_by_pair(
    pool: &SqlitePool,
    user_lo: Uuid,
    user_hi: Uuid,
) -> Result<Option<Connection>> {
    let connection = sqlx::query_as::<_, Connection>(
        r#"
        SELECT id, user_lo, user_hi, connection_request_id, is_active, connected_at
        FROM connections
        WHERE user_lo = ?1 AND user_hi = ?2
        "#,
    )
    .bind(user_lo)
    .bind(user_hi)
    .fetch_optional(pool)
    .await?;

    Ok(connection)
}

/// Soft delete / restore: connections are deactivated, never removed.
pub async fn set_connection_active(
    pool: &SqlitePool,
    connection_id: Uuid,
    active: bool,
) -> Result<()> {
    sqlx::query("UPDATE connections SET is_active = ?2 WHERE id = ?1")
        .bind(connection_id)
        .bind(active)
        .execute(pool)
        .await?;

    Ok(())
}

#[derive(FromRow)]
struct ConnectionEntryRow {
    id: Uuid,
    connected_at: DateTime<Utc>,
    other_id: Uuid,
    other_name: String,
    other_pronouns: Option<String>,
    other_photo_url: Option<String>,
    conversation_id: Option<Uuid>,
    last_message_at: Option<DateTime<Utc>>,
    last_message_preview: Option<String>,
}

/// A user's active connections, newest first, each with the other party's
/// public profile and the conversation's feed summary.
pub async fn list_user_connections(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<ConnectionEntry>> {
    let rows = sqlx::query_as::<_, ConnectionEntryRow>(
        r#"
        SELECT
            c.id,
            c.connected_at,
            u.id AS other_id,
            u.name AS other_name,
            u.pronouns AS other_pronouns,
            u.photo_url AS other_photo_url,
            v.id AS conversation_id,
            v.last_message_at,
            v.last_message_preview
        FROM connections c
        JOIN users u ON u.id = CASE WHEN c.user_lo = ?1 THEN c.user_hi ELSE c.user_lo END
        LEFT JOIN conversations v ON v.connection_id = c.id
        WHERE c.is_active = 1
          AND (c.user_lo = ?1 OR c.user_hi = ?1)
        ORDER BY c.connected_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let entries = rows
        .into_iter()
        .map(|row| ConnectionEntry {
            connection_id: row.id,
            connected_at: row.connected_at,
            other_user: UserProfile {
                id: row.other_id,
                name: row.other_name,
                pronouns: row.other_pronouns,
                photo_url: row.other_photo_url,
            },
            conversation_id: row.conversation_id,
            last_message_at: row.last_message_at,
            last_message_preview: row.last_message_preview,
        })
        .collect();

    Ok(entries)
}
