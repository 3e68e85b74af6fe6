use axum::{extract::{Query, State}, http::StatusCode, response::Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::RecordOutcome;
use crate::services;

#[derive(Debug, Deserialize)]
pub struct RecordEncounterRequest {
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub window_days: Option<i64>,
    pub min_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListEncountersQuery {
    pub user_id: Uuid,
}

/// POST /api/encounters
pub async fn record_encounter(
    State((pool, _config)): State<AppState>,
    Json(req): Json<RecordEncounterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let outcome = services::encounters::record_encounter(
        &pool,
        req.user1_id,
        req.user2_id,
        req.latitude,
        req.longitude,
        Utc::now(),
    )
    .await?;

    match outcome {
        RecordOutcome::Recorded(encounter) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Encounter recorded successfully",
                "data": {
                    "id": encounter.id,
                    "user1_id": encounter.user_lo,
                    "user2_id": encounter.user_hi,
                    "encountered_at": encounter.encountered_at,
                },
            })),
        )),
        RecordOutcome::Duplicate => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Encounter already recorded (duplicate ignored)",
                "data": null,
            })),
        )),
    }
}

// Non-positive overrides would make every pair eligible; fall back to the
// configured default instead.
fn scan_param(override_value: Option<i64>, default: i64) -> i64 {
    override_value.filter(|v| *v > 0).unwrap_or(default)
}

/// GET /api/encounters/check-requests
pub async fn check_requests(
    State((pool, config)): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<Value>, ApiError> {
    let window_days = scan_param(query.window_days, config.encounter_window_days);
    let min_count = scan_param(query.min_count, config.min_encounter_count);

    let pairs =
        db::encounters::find_eligible_pairs(&pool, Utc::now(), window_days, min_count).await?;
    let count = pairs.len();

    Ok(Json(json!({
        "success": true,
        "data": pairs,
        "count": count,
    })))
}

/// GET /api/encounters?user_id=...
pub async fn list_encounters(
    State((pool, _config)): State<AppState>,
    Query(query): Query<ListEncountersQuery>,
) -> Result<Json<Value>, ApiError> {
    let encounters = services::encounters::user_encounters(&pool, query.user_id).await?;
    let count = encounters.len();

    Ok(Json(json!({
        "success": true,
        "data": encounters,
        "count": count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_param_uses_positive_override() {
        assert_eq!(scan_param(Some(7), 14), 7);
        assert_eq!(scan_param(Some(1), 3), 1);
    }

    #[test]
    fn test_scan_param_rejects_non_positive() {
        assert_eq!(scan_param(Some(0), 3), 3);
        assert_eq!(scan_param(Some(-5), 14), 14);
    }

    #[test]
    fn test_scan_param_defaults_when_absent() {
        assert_eq!(scan_param(None, 14), 14);
    }
}
