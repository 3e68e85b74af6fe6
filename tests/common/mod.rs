use chrono::{DateTime, TimeZone, Utc};
use proxima::db;
use proxima::models::User;
use proxima::services;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fixed reference instant so window arithmetic in tests is deterministic.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub async fn create_user(pool: &SqlitePool, name: &str) -> User {
    db::users::create_user(pool, name, None, None, None, base_time())
        .await
        .unwrap()
}

/// Two users returned in canonical id order, so assertions about
/// requester/requested and user_lo/user_hi read naturally.
pub async fn user_pair(pool: &SqlitePool) -> (User, User) {
    let a = create_user(pool, "Alex").await;
    let b = create_user(pool, "Blair").await;
    if a.id < b.id { (a, b) } else { (b, a) }
}

/// Records `count` encounters for the pair, one minute apart, ending at
/// `last`. Panics if any of them comes back as a duplicate.
pub async fn record_encounters(
    pool: &SqlitePool,
    u1: Uuid,
    u2: Uuid,
    count: i64,
    last: DateTime<Utc>,
) {
    for i in 0..count {
        let at = last - chrono::Duration::minutes(count - 1 - i);
        let outcome = services::encounters::record_encounter(pool, u1, u2, None, None, at)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            proxima::models::RecordOutcome::Recorded(_)
        ));
    }
}

pub async fn encounter_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM encounters")
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn request_id_for_pair(pool: &SqlitePool, requester: Uuid, requested: Uuid) -> Uuid {
    sqlx::query_scalar(
        "SELECT id FROM connection_requests WHERE requester_id = ?1 AND requested_id = ?2",
    )
    .bind(requester)
    .bind(requested)
    .fetch_one(pool)
    .await
    .unwrap()
}
