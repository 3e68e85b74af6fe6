use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::UserProfile;

/// One recorded co-presence event on a canonical pair (user_lo < user_hi).
/// Rows are append-only; near-duplicates within the same minute are
/// suppressed by a unique index on the pair plus the minute bucket.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Encounter {
    pub id: Uuid,
    pub user_lo: Uuid,
    pub user_hi: Uuid,
    pub encountered_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Outcome of recording an encounter. A duplicate within the same minute
/// is a successful no-op, not an error.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded(Encounter),
    Duplicate,
}

/// A pair that has met often enough within the trailing window and has no
/// live request or active connection yet.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EligiblePair {
    pub user_lo: Uuid,
    pub user_hi: Uuid,
    pub encounter_count: i64,
    pub first_encounter: DateTime<Utc>,
    pub last_encounter: DateTime<Utc>,
}

/// Feed entry for a single user's encounter history.
#[derive(Debug, Clone, Serialize)]
pub struct UserEncounter {
    pub id: Uuid,
    pub encountered_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub other_user: UserProfile,
}
