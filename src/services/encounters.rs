use crate::constants::ENCOUNTER_FEED_LIMIT;
use crate::db;
use crate::error::ApiError;
use crate::models::{RecordOutcome, UserEncounter};
use crate::utils::canonicalize;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Records one co-presence event between two users. The pair is stored in
/// canonical order; a second detection within the same minute comes back
/// as `RecordOutcome::Duplicate` rather than a second row.
pub async fn record_encounter(
    pool: &SqlitePool,
    user_a: Uuid,
    user_b: Uuid,
    latitude: Option<f64>,
    longitude: Option<f64>,
    now: DateTime<Utc>,
) -> Result<RecordOutcome, ApiError> {
    if user_a == user_b {
        return Err(ApiError::Validation(
            "Cannot record an encounter between a user and themselves".to_string(),
        ));
    }

    let (user_lo, user_hi) = canonicalize(user_a, user_b);

    // Coarse check on purpose: the caller only needs to know the pair is
    // not fully resolvable, not which side is missing.
    let active = db::users::count_active_users(pool, user_lo, user_hi).await?;
    if active != 2 {
        return Err(ApiError::NotFound("One or both users not found".to_string()));
    }

    match db::encounters::insert_encounter(pool, user_lo, user_hi, latitude, longitude, now).await?
    {
        Some(encounter) => Ok(RecordOutcome::Recorded(encounter)),
        None => {
            tracing::debug!(
                "duplicate encounter suppressed for pair ({}, {})",
                user_lo,
                user_hi
            );
            Ok(RecordOutcome::Duplicate)
        }
    }
}

/// A user's recent encounter feed, capped at the most recent 100.
pub async fn user_encounters(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<UserEncounter>, ApiError> {
    let encounters =
        db::encounters::list_user_encounters(pool, user_id, ENCOUNTER_FEED_LIMIT).await?;
    Ok(encounters)
}
