use crate::constants::MINUTE_BUCKET_FORMAT;
use crate::models::{EligiblePair, Encounter, UserEncounter, UserProfile};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Inserts one encounter row for a canonical pair. Returns `None` when the
/// pair already has a row in the same minute bucket; that unique violation
/// is benign duplication (client retries, near-simultaneous detections)
/// and must not surface as an error.
pub async fn insert_encounter(
    pool: &SqlitePool,
    user_lo: Uuid,
    user_hi: Uuid,
    latitude: Option<f64>,
    longitude: Option<f64>,
    at: DateTime<Utc>,
) -> Result<Option<Encounter>> {
    let bucket = at.format(MINUTE_BUCKET_FORMAT).to_string();

    let result = sqlx::query_as::<_, Encounter>(
        r#"
        INSERT INTO encounters (id, user_lo, user_hi, encountered_at, minute_bucket, latitude, longitude)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING id, user_lo, user_hi, encountered_at, latitude, longitude
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_lo)
    .bind(user_hi)
    .bind(at)
    .bind(&bucket)
    .bind(latitude)
    .bind(longitude)
    .fetch_one(pool)
    .await;

    match result {
        Ok(encounter) => Ok(Some(encounter)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The core matching predicate: canonical pairs with at least `min_count`
/// encounters since `now - window_days`, excluding pairs that already have
/// a live request or an active connection. Requests store their pair in
/// canonical order, so a single-direction check suffices. Pure read; safe
/// to re-run on a schedule or on demand.
pub async fn find_eligible_pairs(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    window_days: i64,
    min_count: i64,
) -> Result<Vec<EligiblePair>> {
    let cutoff = now - Duration::days(window_days);

    let pairs = sqlx::query_as::<_, EligiblePair>(
        r#"
        SELECT
            e.user_lo,
            e.user_hi,
            COUNT(*) AS encounter_count,
            MIN(e.encountered_at) AS first_encounter,
            MAX(e.encountered_at) AS last_encounter
        FROM encounters e
        WHERE e.encountered_at >= ?1
        GROUP BY e.user_lo, e.user_hi
        HAVING COUNT(*) >= ?2
        AND NOT EXISTS (
            SELECT 1 FROM connection_requests cr
            WHERE cr.requester_id = e.user_lo
              AND cr.requested_id = e.user_hi
              AND cr.status IN ('pending', 'accepted')
        )
        AND NOT EXISTS (
            SELECT 1 FROM connections c
            WHERE c.user_lo = e.user_lo
              AND c.user_hi = e.user_hi
              AND c.is_active = 1
        )
        "#,
    )
    .bind(cutoff)
    .bind(min_count)
    .fetch_all(pool)
    .await?;

    Ok(pairs)
}

#[derive(FromRow)]
struct UserEncounterRow {
    id: Uuid,
    encountered_at: DateTime<Utc>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    other_id: Uuid,
    other_name: String,
    other_pronouns: Option<String>,
    other_photo_url: Option<String>,
}

/// Most recent encounters involving one user, newest first, with the other
/// party's public profile attached.
pub async fn list_user_encounters(
    pool: &SqlitePool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<UserEncounter>> {
    let rows = sqlx::query_as::<_, UserEncounterRow>(
        r#"
        SELECT
            e.id,
            e.encountered_at,
            e.latitude,
            e.longitude,
            u.id AS other_id,
            u.name AS other_name,
            u.pronouns AS other_pronouns,
            u.photo_url AS other_photo_url
        FROM encounters e
        JOIN users u ON u.id = CASE WHEN e.user_lo = ?1 THEN e.user_hi ELSE e.user_lo END
        WHERE e.user_lo = ?1 OR e.user_hi = ?1
        ORDER BY e.encountered_at DESC
        LIMIT ?2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let encounters = rows
        .into_iter()
        .map(|row| UserEncounter {
            id: row.id,
            encountered_at: row.encountered_at,
            latitude: row.latitude,
            longitude: row.longitude,
            other_user: UserProfile {
                id: row.other_id,
                name: row.other_name,
                pronouns: row.other_pronouns,
                photo_url: row.other_photo_url,
            },
        })
        .collect();

    Ok(encounters)
}
