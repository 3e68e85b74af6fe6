use crate::constants::REQUEST_EXPIRY_DAYS;
use crate::db;
use crate::error::ApiError;
use crate::models::{ConnectionRequest, RequestStatus};
use crate::utils::canonicalize;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Result of one request-creation scan: how many requests were actually
/// inserted vs. how many pairs qualified.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestCreation {
    pub created: usize,
    pub total: usize,
}

/// Outcome of one party responding to a connection request.
#[derive(Debug, Clone)]
pub enum RespondOutcome {
    Rejected,
    Waiting {
        request_id: Uuid,
        status: RequestStatus,
    },
    Established {
        connection_id: Uuid,
        conversation_id: Uuid,
        already_existed: bool,
    },
}

/// Creates a pending request for every currently eligible pair. The
/// requester/requested fields are assigned in canonical order; the role
/// carries no social meaning. A pair whose request already exists (for
/// example, a concurrent scan won the insert) is counted in `total` but
/// not in `created`.
pub async fn create_requests(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    window_days: i64,
    min_count: i64,
) -> Result<RequestCreation, ApiError> {
    let pairs = db::encounters::find_eligible_pairs(pool, now, window_days, min_count).await?;
    let expires_at = now + Duration::days(REQUEST_EXPIRY_DAYS);

    let mut created = 0;
    for pair in &pairs {
        let inserted =
            db::requests::create_request(pool, pair.user_lo, pair.user_hi, now, expires_at)
                .await?;
        if inserted.is_some() {
            created += 1;
        }
    }

    if created > 0 {
        tracing::info!("created {} connection request(s) from {} eligible pair(s)", created, pairs.len());
    }

    Ok(RequestCreation {
        created,
        total: pairs.len(),
    })
}

/// One party accepts or rejects a pending request.
///
/// Rejection is terminal. Acceptance stamps only the caller's own
/// timestamp; the request stays pending until the other party's stamp is
/// also present, at which point the connection and its conversation are
/// materialized exactly once.
pub async fn respond(
    pool: &SqlitePool,
    request_id: Uuid,
    user_id: Uuid,
    accept: bool,
    now: DateTime<Utc>,
) -> Result<RespondOutcome, ApiError> {
    let request = db::requests::get_request(pool, request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Connection request not found".to_string()))?;

    if request.status != RequestStatus::Pending {
        return Err(ApiError::InvalidState(
            "Connection request is not pending".to_string(),
        ));
    }

    if !request.involves(user_id) {
        return Err(ApiError::Forbidden(
            "User is not part of this connection request".to_string(),
        ));
    }

    if !accept {
        db::requests::set_status(pool, request_id, RequestStatus::Rejected).await?;
        return Ok(RespondOutcome::Rejected);
    }

    let as_requester = request.requester_id == user_id;
    let updated = db::requests::record_acceptance(pool, request_id, as_requester, now).await?;

    if !updated.both_accepted() {
        return Ok(RespondOutcome::Waiting {
            request_id: updated.id,
            status: updated.status,
        });
    }

    let (connection_id, conversation_id, already_existed) =
        materialize_connection(pool, &updated, now).await?;

    Ok(RespondOutcome::Established {
        connection_id,
        conversation_id,
        already_existed,
    })
}

/// The critical transition: both acceptance timestamps are set, so the
/// connection and conversation must come into existence exactly once.
///
/// Two callers can reach this at the same time; the connection table's
/// unique constraint on the canonical pair decides the winner and the
/// loser adopts the winner's row. The conversation write is a
/// create-if-absent upsert, so re-running the whole transition (including
/// from the sweeper's repair pass) is safe.
pub async fn materialize_connection(
    pool: &SqlitePool,
    request: &ConnectionRequest,
    now: DateTime<Utc>,
) -> Result<(Uuid, Uuid, bool), ApiError> {
    let (user_lo, user_hi) = canonicalize(request.requester_id, request.requested_id);

    match db::connections::insert_connection(pool, user_lo, user_hi, request.id, now).await? {
        Some(connection) => {
            db::requests::set_status(pool, request.id, RequestStatus::Accepted).await?;
            let conversation =
                db::conversations::upsert_for_connection(pool, connection.id, now).await?;

            tracing::info!(
                "connection {} established for pair ({}, {})",
                connection.id,
                user_lo,
                user_hi
            );

            Ok((connection.id, conversation.id, false))
        }
        None => {
            // The pair's connection already exists: either another caller
            // won the race, or an earlier materialization died partway
            // through. Adopt the existing row and finish the remaining
            // writes so the request cannot stay pending behind it.
            let existing = db::connections::get_connection_by_pair(pool, user_lo, user_hi)
                .await?
                .ok_or_else(|| {
                    ApiError::Internal(anyhow::anyhow!(
                        "connection insert conflicted but no row found for pair ({}, {})",
                        user_lo,
                        user_hi
                    ))
                })?;

            if request.status == RequestStatus::Pending {
                db::requests::set_status(pool, request.id, RequestStatus::Accepted).await?;
            }

            let conversation =
                db::conversations::upsert_for_connection(pool, existing.id, now).await?;

            Ok((existing.id, conversation.id, true))
        }
    }
}

/// Flips pending requests past their deadline to expired.
pub async fn expire_overdue_requests(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<u64, ApiError> {
    let expired = db::requests::expire_overdue(pool, now).await?;
    Ok(expired)
}

/// Repair pass for the non-atomic acceptance transition: a crash anywhere
/// between "both accepted" and the conversation upsert leaves a request
/// stuck partway through. Re-running materialization completes whatever
/// steps are missing. Returns how many requests were completed.
pub async fn repair_unmaterialized(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, ApiError> {
    let stuck = db::requests::find_unmaterialized(pool).await?;
    let mut repaired = 0;

    for request in &stuck {
        materialize_connection(pool, request, now).await?;
        repaired += 1;
    }

    Ok(repaired)
}
