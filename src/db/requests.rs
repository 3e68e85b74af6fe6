use crate::models::{ConnectionRequest, PendingRequestEntry, RequestStatus, UserProfile};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

const REQUEST_COLUMNS: &str = "id, requester_id, requested_id, status, \
     requester_accepted_at, requested_accepted_at, created_at, expires_at";

/// Creates a pending request for a canonical pair. Returns `None` when a
/// live (pending/accepted) request already exists for the pair; a scan
/// racing another scan loses the insert and treats it as a no-op.
pub async fn create_request(
    pool: &SqlitePool,
    requester_id: Uuid,
    requested_id: Uuid,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Option<ConnectionRequest>> {
    let result = sqlx::query_as::<_, ConnectionRequest>(&format!(
        r#"
        INSERT INTO connection_requests (id, requester_id, requested_id, status, created_at, expires_at)
        VALUES (?1, ?2, ?3, 'pending', ?4, ?5)
        RETURNING {REQUEST_COLUMNS}
        "#,
    ))
    .bind(Uuid::new_v4())
    .bind(requester_id)
    .bind(requested_id)
    .bind(now)
    .bind(expires_at)
    .fetch_one(pool)
    .await;

    match result {
        Ok(request) => Ok(Some(request)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_request(pool: &SqlitePool, request_id: Uuid) -> Result<Option<ConnectionRequest>> {
    let request = sqlx::query_as::<_, ConnectionRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM connection_requests WHERE id = ?1"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    Ok(request)
}

pub async fn set_status(pool: &SqlitePool, request_id: Uuid, status: RequestStatus) -> Result<()> {
    sqlx::query("UPDATE connection_requests SET status = ?2 WHERE id = ?1")
        .bind(request_id)
        .bind(status)
        .execute(pool)
        .await?;

    Ok(())
}

/// Stamps one party's acceptance timestamp. COALESCE keeps the write
/// monotonic: once set it is never moved, so a retried accept cannot
/// clobber the original timestamp. Returns the updated row.
pub async fn record_acceptance(
    pool: &SqlitePool,
    request_id: Uuid,
    as_requester: bool,
    now: DateTime<Utc>,
) -> Result<ConnectionRequest> {
    let sql = if as_requester {
        "UPDATE connection_requests \
         SET requester_accepted_at = COALESCE(requester_accepted_at, ?2) \
         WHERE id = ?1"
    } else {
        "UPDATE connection_requests \
         SET requested_accepted_at = COALESCE(requested_accepted_at, ?2) \
         WHERE id = ?1"
    };

    sqlx::query(sql)
        .bind(request_id)
        .bind(now)
        .execute(pool)
        .await?;

    let request = get_request(pool, request_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("request {} disappeared during acceptance", request_id))?;

    Ok(request)
}

/// Advisory expiry sweep: pending requests past their deadline flip to
/// expired. Only requests that were never mutually accepted expire; a
/// both-stamped request past its deadline is waiting on the repair pass,
/// not abandonment. Returns how many rows were flipped.
pub async fn expire_overdue(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE connection_requests SET status = 'expired' \
         WHERE status = 'pending' AND expires_at <= ?1 \
         AND (requester_accepted_at IS NULL OR requested_accepted_at IS NULL)",
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Requests where both parties have accepted but materialization did not
/// run to completion. A crash can strike before the connection insert
/// (request still pending, no connection), between the insert and the
/// status write (connection exists, request still pending), or before the
/// conversation upsert (connection exists, no conversation). All three
/// leave the request here; only a request whose pair has both its
/// connection and conversation, with status accepted, is done.
/// Re-running materialization on these is idempotent.
pub async fn find_unmaterialized(pool: &SqlitePool) -> Result<Vec<ConnectionRequest>> {
    let requests = sqlx::query_as::<_, ConnectionRequest>(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM connection_requests cr
        WHERE cr.requester_accepted_at IS NOT NULL
          AND cr.requested_accepted_at IS NOT NULL
          AND cr.status IN ('pending', 'accepted')
          AND (
              cr.status = 'pending'
              OR NOT EXISTS (
                  SELECT 1 FROM connections c
                  JOIN conversations v ON v.connection_id = c.id
                  WHERE c.user_lo = cr.requester_id
                    AND c.user_hi = cr.requested_id
              )
          )
        "#,
    ))
    .fetch_all(pool)
    .await?;

    Ok(requests)
}

#[derive(FromRow)]
struct PendingRequestRow {
    id: Uuid,
    requester_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    other_id: Uuid,
    other_name: String,
    other_pronouns: Option<String>,
    other_photo_url: Option<String>,
}

/// Pending requests involving one user, newest first, with the other
/// party's public profile attached.
pub async fn list_pending_for_user(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<PendingRequestEntry>> {
    let rows = sqlx::query_as::<_, PendingRequestRow>(
        r#"
        SELECT
            cr.id,
            cr.requester_id,
            cr.created_at,
            cr.expires_at,
            u.id AS other_id,
            u.name AS other_name,
            u.pronouns AS other_pronouns,
            u.photo_url AS other_photo_url
        FROM connection_requests cr
        JOIN users u ON u.id = CASE WHEN cr.requester_id = ?1 THEN cr.requested_id ELSE cr.requester_id END
        WHERE cr.status = 'pending'
          AND (cr.requester_id = ?1 OR cr.requested_id = ?1)
        ORDER BY cr.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let entries = rows
        .into_iter()
        .map(|row| PendingRequestEntry {
            request_id: row.id,
            is_requester: row.requester_id == user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            other_user: UserProfile {
                id: row.other_id,
                name: row.other_name,
                pronouns: row.other_pronouns,
                photo_url: row.other_photo_url,
            },
        })
        .collect();

    Ok(entries)
}
