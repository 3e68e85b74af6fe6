mod common;

use chrono::Duration;
use common::*;
use proxima::ApiError;
use proxima::db;
use proxima::models::{RecordOutcome, RequestStatus};
use proxima::services::{encounters, matching};
use proxima::services::matching::RespondOutcome;
use sqlx::SqlitePool;
use uuid::Uuid;

const WINDOW_DAYS: i64 = 14;
const MIN_COUNT: i64 = 3;

#[sqlx::test]
async fn duplicate_encounter_within_same_minute_is_suppressed(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let at = base_time();

    let first = encounters::record_encounter(&pool, u1.id, u2.id, None, None, at)
        .await
        .unwrap();
    assert!(matches!(first, RecordOutcome::Recorded(_)));

    // Same minute bucket, argument order flipped.
    let second = encounters::record_encounter(&pool, u2.id, u1.id, None, None, at + Duration::seconds(30))
        .await
        .unwrap();
    assert!(matches!(second, RecordOutcome::Duplicate));
    assert_eq!(encounter_count(&pool).await, 1);

    // Next minute is a fresh row.
    let third = encounters::record_encounter(&pool, u1.id, u2.id, None, None, at + Duration::seconds(60))
        .await
        .unwrap();
    assert!(matches!(third, RecordOutcome::Recorded(_)));
    assert_eq!(encounter_count(&pool).await, 2);
}

#[sqlx::test]
async fn encounters_are_stored_on_the_canonical_pair(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;

    // Record with the arguments reversed; the stored row is still (lo, hi).
    let outcome = encounters::record_encounter(&pool, u2.id, u1.id, None, None, base_time())
        .await
        .unwrap();

    match outcome {
        RecordOutcome::Recorded(e) => {
            assert_eq!(e.user_lo, u1.id);
            assert_eq!(e.user_hi, u2.id);
            assert!(e.user_lo < e.user_hi);
        }
        RecordOutcome::Duplicate => panic!("expected a recorded encounter"),
    }
}

#[sqlx::test]
async fn self_encounter_is_rejected(pool: SqlitePool) {
    let u = create_user(&pool, "Solo").await;

    let err = encounters::record_encounter(&pool, u.id, u.id, None, None, base_time())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[sqlx::test]
async fn encounter_requires_two_active_users(pool: SqlitePool) {
    let u = create_user(&pool, "Only").await;

    let err = encounters::record_encounter(&pool, u.id, Uuid::new_v4(), None, None, base_time())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // A deactivated user counts as missing.
    let other = create_user(&pool, "Gone").await;
    sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
        .bind(other.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = encounters::record_encounter(&pool, u.id, other.id, None, None, base_time())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[sqlx::test]
async fn eligibility_needs_min_count_encounters(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT - 1, now).await;
    let pairs = db::encounters::find_eligible_pairs(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert!(pairs.is_empty());

    // One more encounter crosses the threshold exactly.
    encounters::record_encounter(&pool, u1.id, u2.id, None, None, now + Duration::minutes(1))
        .await
        .unwrap();
    let pairs = db::encounters::find_eligible_pairs(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].user_lo, u1.id);
    assert_eq!(pairs[0].user_hi, u2.id);
    assert_eq!(pairs[0].encounter_count, MIN_COUNT);
}

#[sqlx::test]
async fn eligibility_window_boundary_is_inclusive(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();
    let cutoff = now - Duration::days(WINDOW_DAYS);

    // Oldest encounter sits exactly on the cutoff; two more inside.
    encounters::record_encounter(&pool, u1.id, u2.id, None, None, cutoff)
        .await
        .unwrap();
    record_encounters(&pool, u1.id, u2.id, 2, now).await;

    let pairs = db::encounters::find_eligible_pairs(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].first_encounter, cutoff);

    // One second later the oldest encounter ages out and the pair drops
    // below the threshold. Eligibility is reassessed, not sticky.
    let pairs = db::encounters::find_eligible_pairs(
        &pool,
        now + Duration::seconds(1),
        WINDOW_DAYS,
        MIN_COUNT,
    )
    .await
    .unwrap();
    assert!(pairs.is_empty());
}

#[sqlx::test]
async fn scanner_skips_pairs_with_a_live_request_or_connection(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;

    let creation = matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert_eq!(creation.created, 1);
    assert_eq!(creation.total, 1);

    // New qualifying encounters do not bring the pair back while the
    // request is pending.
    encounters::record_encounter(&pool, u1.id, u2.id, None, None, now + Duration::minutes(5))
        .await
        .unwrap();
    let pairs = db::encounters::find_eligible_pairs(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert!(pairs.is_empty());

    // A second scan creates nothing either.
    let creation = matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert_eq!(creation.created, 0);
    assert_eq!(creation.total, 0);

    // After both accept, the active connection keeps the pair excluded.
    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;
    matching::respond(&pool, request_id, u1.id, true, now).await.unwrap();
    matching::respond(&pool, request_id, u2.id, true, now).await.unwrap();

    let pairs = db::encounters::find_eligible_pairs(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert!(pairs.is_empty());
}

#[sqlx::test]
async fn rejected_request_makes_pair_eligible_again(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();

    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;
    let outcome = matching::respond(&pool, request_id, u2.id, false, now)
        .await
        .unwrap();
    assert!(matches!(outcome, RespondOutcome::Rejected));

    // Only pending/accepted requests disqualify a pair.
    let pairs = db::encounters::find_eligible_pairs(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    assert_eq!(pairs.len(), 1);
}

#[sqlx::test]
async fn created_requests_use_canonical_roles_and_expiry(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();

    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;
    let request = db::requests::get_request(&pool, request_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(request.requester_id, u1.id);
    assert_eq!(request.requested_id, u2.id);
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.expires_at, now + Duration::days(30));
    assert!(request.requester_accepted_at.is_none());
    assert!(request.requested_accepted_at.is_none());
}

#[sqlx::test]
async fn one_sided_acceptance_leaves_request_pending(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;

    let outcome = matching::respond(&pool, request_id, u1.id, true, now)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RespondOutcome::Waiting { status: RequestStatus::Pending, .. }
    ));

    let request = db::requests::get_request(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert!(request.requester_accepted_at.is_some());
    assert!(request.requested_accepted_at.is_none());

    // No connection materialized yet.
    let connection = db::connections::get_connection_by_pair(&pool, u1.id, u2.id)
        .await
        .unwrap();
    assert!(connection.is_none());
}

#[sqlx::test]
async fn mutual_acceptance_materializes_connection_and_conversation(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;

    matching::respond(&pool, request_id, u1.id, true, now).await.unwrap();
    let outcome = matching::respond(&pool, request_id, u2.id, true, now)
        .await
        .unwrap();

    let (connection_id, conversation_id) = match outcome {
        RespondOutcome::Established {
            connection_id,
            conversation_id,
            already_existed,
        } => {
            assert!(!already_existed);
            (connection_id, conversation_id)
        }
        other => panic!("expected Established, got {:?}", other),
    };

    let connection = db::connections::get_connection_by_pair(&pool, u1.id, u2.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connection.id, connection_id);
    assert_eq!(connection.user_lo, u1.id);
    assert_eq!(connection.user_hi, u2.id);
    assert_eq!(connection.connection_request_id, request_id);
    assert!(connection.is_active);

    let conversation = db::conversations::get_conversation(&pool, conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.connection_id, connection_id);

    let request = db::requests::get_request(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
}

#[sqlx::test]
async fn materialization_is_idempotent_under_races(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;

    matching::respond(&pool, request_id, u1.id, true, now).await.unwrap();
    matching::respond(&pool, request_id, u2.id, true, now).await.unwrap();

    // A second caller observing "both accepted" re-runs the transition and
    // must adopt the winner's rows instead of failing or duplicating.
    let request = db::requests::get_request(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    let (first_conn, first_conv, _) = matching::materialize_connection(&pool, &request, now)
        .await
        .unwrap();
    let (second_conn, second_conv, already_existed) =
        matching::materialize_connection(&pool, &request, now)
            .await
            .unwrap();

    assert!(already_existed);
    assert_eq!(first_conn, second_conn);
    assert_eq!(first_conv, second_conv);

    let connections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM connections")
        .fetch_one(&pool)
        .await
        .unwrap();
    let conversations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(connections, 1);
    assert_eq!(conversations, 1);
}

#[sqlx::test]
async fn rejection_is_terminal(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;

    matching::respond(&pool, request_id, u2.id, false, now).await.unwrap();

    let err = matching::respond(&pool, request_id, u1.id, true, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));

    let request = db::requests::get_request(&pool, request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, RequestStatus::Rejected);
}

#[sqlx::test]
async fn third_party_responder_is_forbidden(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let outsider = create_user(&pool, "Casey").await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();
    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;

    let err = matching::respond(&pool, request_id, outsider.id, true, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[sqlx::test]
async fn responding_to_missing_request_is_not_found(pool: SqlitePool) {
    let u = create_user(&pool, "Drew").await;

    let err = matching::respond(&pool, Uuid::new_v4(), u.id, true, base_time())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[sqlx::test]
async fn overdue_pending_requests_expire(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    db::requests::create_request(&pool, u1.id, u2.id, now - Duration::days(31), now - Duration::days(1))
        .await
        .unwrap()
        .unwrap();

    let expired = matching::expire_overdue_requests(&pool, now).await.unwrap();
    assert_eq!(expired, 1);

    let request_id = request_id_for_pair(&pool, u1.id, u2.id).await;
    let err = matching::respond(&pool, request_id, u1.id, true, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));

    // Nothing left to expire on the second sweep.
    let expired = matching::expire_overdue_requests(&pool, now).await.unwrap();
    assert_eq!(expired, 0);
}

#[sqlx::test]
async fn repair_completes_interrupted_acceptance(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    let request = db::requests::create_request(&pool, u1.id, u2.id, now, now + Duration::days(30))
        .await
        .unwrap()
        .unwrap();

    // Both parties accepted but the process died before the connection
    // insert: stamp the timestamps directly, touch nothing else.
    db::requests::record_acceptance(&pool, request.id, true, now).await.unwrap();
    db::requests::record_acceptance(&pool, request.id, false, now).await.unwrap();

    let stuck = db::requests::find_unmaterialized(&pool).await.unwrap();
    assert_eq!(stuck.len(), 1);

    let repaired = matching::repair_unmaterialized(&pool, now).await.unwrap();
    assert_eq!(repaired, 1);

    let connection = db::connections::get_connection_by_pair(&pool, u1.id, u2.id)
        .await
        .unwrap()
        .unwrap();
    let conversation = db::conversations::upsert_for_connection(&pool, connection.id, now)
        .await
        .unwrap();
    assert_eq!(conversation.connection_id, connection.id);

    let request = db::requests::get_request(&pool, request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);

    // Nothing left for a second sweep.
    let repaired = matching::repair_unmaterialized(&pool, now).await.unwrap();
    assert_eq!(repaired, 0);
}

#[sqlx::test]
async fn repair_completes_acceptance_interrupted_after_connection_insert(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    let request = db::requests::create_request(&pool, u1.id, u2.id, now, now + Duration::days(30))
        .await
        .unwrap()
        .unwrap();

    // Both parties accepted and the connection row landed, but the process
    // died before the status write and the conversation upsert.
    db::requests::record_acceptance(&pool, request.id, true, now).await.unwrap();
    db::requests::record_acceptance(&pool, request.id, false, now).await.unwrap();
    db::connections::insert_connection(&pool, u1.id, u2.id, request.id, now)
        .await
        .unwrap()
        .unwrap();

    let stuck = db::requests::find_unmaterialized(&pool).await.unwrap();
    assert_eq!(stuck.len(), 1);

    let repaired = matching::repair_unmaterialized(&pool, now).await.unwrap();
    assert_eq!(repaired, 1);

    let request = db::requests::get_request(&pool, request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);

    let connection = db::connections::get_connection_by_pair(&pool, u1.id, u2.id)
        .await
        .unwrap()
        .unwrap();
    let conversations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE connection_id = ?1")
            .bind(connection.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(conversations, 1);

    // Fully materialized now, so the sweep is done with it.
    let repaired = matching::repair_unmaterialized(&pool, now).await.unwrap();
    assert_eq!(repaired, 0);
}

#[sqlx::test]
async fn repair_creates_missing_conversation_for_accepted_request(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    let request = db::requests::create_request(&pool, u1.id, u2.id, now, now + Duration::days(30))
        .await
        .unwrap()
        .unwrap();

    // Crash one step later: status already accepted, conversation missing.
    db::requests::record_acceptance(&pool, request.id, true, now).await.unwrap();
    db::requests::record_acceptance(&pool, request.id, false, now).await.unwrap();
    db::connections::insert_connection(&pool, u1.id, u2.id, request.id, now)
        .await
        .unwrap()
        .unwrap();
    db::requests::set_status(&pool, request.id, RequestStatus::Accepted)
        .await
        .unwrap();

    let repaired = matching::repair_unmaterialized(&pool, now).await.unwrap();
    assert_eq!(repaired, 1);

    let connection = db::connections::get_connection_by_pair(&pool, u1.id, u2.id)
        .await
        .unwrap()
        .unwrap();
    let conversation = db::conversations::upsert_for_connection(&pool, connection.id, now)
        .await
        .unwrap();
    assert_eq!(conversation.connection_id, connection.id);

    let repaired = matching::repair_unmaterialized(&pool, now).await.unwrap();
    assert_eq!(repaired, 0);
}

#[sqlx::test]
async fn expiry_skips_mutually_accepted_requests(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    // Overdue but both-stamped: waiting on repair, not abandoned.
    let request = db::requests::create_request(
        &pool,
        u1.id,
        u2.id,
        now - Duration::days(31),
        now - Duration::days(1),
    )
    .await
    .unwrap()
    .unwrap();
    db::requests::record_acceptance(&pool, request.id, true, now).await.unwrap();
    db::requests::record_acceptance(&pool, request.id, false, now).await.unwrap();

    let expired = matching::expire_overdue_requests(&pool, now).await.unwrap();
    assert_eq!(expired, 0);

    let repaired = matching::repair_unmaterialized(&pool, now).await.unwrap();
    assert_eq!(repaired, 1);

    let request = db::requests::get_request(&pool, request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
}

#[sqlx::test]
async fn acceptance_timestamp_is_monotonic(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    let request = db::requests::create_request(&pool, u1.id, u2.id, now, now + Duration::days(30))
        .await
        .unwrap()
        .unwrap();

    let first = db::requests::record_acceptance(&pool, request.id, true, now)
        .await
        .unwrap();
    let retried =
        db::requests::record_acceptance(&pool, request.id, true, now + Duration::minutes(5))
            .await
            .unwrap();

    // A retried accept never moves the original stamp.
    assert_eq!(retried.requester_accepted_at, first.requester_accepted_at);
    assert_eq!(first.requester_accepted_at, Some(now));
}

#[sqlx::test]
async fn duplicate_request_insert_is_absorbed(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    let first = db::requests::create_request(&pool, u1.id, u2.id, now, now + Duration::days(30))
        .await
        .unwrap();
    assert!(first.is_some());

    let second = db::requests::create_request(&pool, u1.id, u2.id, now, now + Duration::days(30))
        .await
        .unwrap();
    assert!(second.is_none());
}

#[sqlx::test]
async fn pending_list_shows_both_sides(pool: SqlitePool) {
    let (u1, u2) = user_pair(&pool).await;
    let now = base_time();

    record_encounters(&pool, u1.id, u2.id, MIN_COUNT, now).await;
    matching::create_requests(&pool, now, WINDOW_DAYS, MIN_COUNT)
        .await
        .unwrap();

    let for_u1 = db::requests::list_pending_for_user(&pool, u1.id).await.unwrap();
    assert_eq!(for_u1.len(), 1);
    assert!(for_u1[0].is_requester);
    assert_eq!(for_u1[0].other_user.id, u2.id);

    let for_u2 = db::requests::list_pending_for_user(&pool, u2.id).await.unwrap();
    assert_eq!(for_u2.len(), 1);
    assert!(!for_u2[0].is_requester);
    assert_eq!(for_u2[0].other_user.id, u1.id);
}
