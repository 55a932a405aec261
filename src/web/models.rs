use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Full judge record as stored, shared by the judges module and the
/// review workflow (which denormalizes the judge name into feedback rows).
#[derive(Clone, FromRow)]
pub struct JudgeRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub country: String,
    pub languages: Vec<String>,
    pub dance_genres: Vec<String>,
    pub hourly_rate: i64,
    pub is_platinum: bool,
    pub rating: f64,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
}
