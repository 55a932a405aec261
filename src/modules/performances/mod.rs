use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::web::{
    ApiMessage, ApiResult, AppState, FeedbackTier, PerformanceStatus, json_error,
};

/// Closed enumeration of submittable dance genres.
pub const DANCE_GENRES: &[&str] = &[
    "ballet",
    "contemporary",
    "hip-hop",
    "jazz",
    "latin",
    "ballroom",
    "cultural",
    "other",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/performances",
            post(create_performance).get(list_performances),
        )
        .route("/api/performances/:id", get(get_performance))
}

#[derive(Deserialize)]
pub struct SubmitPerformanceRequest {
    pub performer_name: String,
    pub email: String,
    pub age: i32,
    pub country: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub performance_title: String,
    pub performance_description: String,
    #[serde(default)]
    pub video_url: String,
    pub dance_genre: String,
    /// UI feedback choice, decoded once into `FeedbackTier` on submit.
    #[serde(default)]
    pub feedback_type: String,
    /// UI judge-tier choice; "platinum" requests an elite judge.
    #[serde(default)]
    pub judge_type: String,
    #[serde(default)]
    pub global_entry: bool,
}

fn default_language() -> String {
    "English".to_string()
}

#[derive(sqlx::FromRow)]
pub struct PerformanceRow {
    pub id: Uuid,
    pub performer_name: String,
    pub email: String,
    pub age: Option<i32>,
    pub performance_title: String,
    pub performance_description: String,
    pub video_url: String,
    pub dance_genre: String,
    pub country: String,
    pub language: String,
    pub feedback_tier: String,
    pub platinum_upgrade: bool,
    pub global_entry: bool,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct PerformanceResponse {
    pub id: Uuid,
    pub performer_name: String,
    pub email: String,
    pub age: Option<i32>,
    pub performance_title: String,
    pub performance_description: String,
    pub video_url: String,
    pub dance_genre: String,
    pub country: String,
    pub language: String,
    pub feedback_tier: FeedbackTier,
    pub platinum_upgrade: bool,
    pub global_entry: bool,
    pub status: PerformanceStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    pub performance: PerformanceResponse,
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub email: Option<String>,
}

async fn create_performance(
    State(state): State<AppState>,
    Json(form): Json<SubmitPerformanceRequest>,
) -> ApiResult<SubmissionResponse> {
    if let Err(message) = validate_submission(&form) {
        return Err(json_error(StatusCode::BAD_REQUEST, message));
    }

    let tier = FeedbackTier::from_choice(&form.feedback_type);
    let platinum_upgrade = form.judge_type.eq_ignore_ascii_case("platinum");
    let id = Uuid::new_v4();

    let row = sqlx::query_as::<_, PerformanceRow>(
        "INSERT INTO performances (id, performer_name, email, age, performance_title, performance_description, video_url, dance_genre, country, language, feedback_tier, platinum_upgrade, global_entry, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         RETURNING *",
    )
    .bind(id)
    .bind(form.performer_name.trim())
    .bind(form.email.trim().to_ascii_lowercase())
    .bind(form.age)
    .bind(form.performance_title.trim())
    .bind(form.performance_description.trim())
    .bind(form.video_url.trim())
    .bind(form.dance_genre.to_ascii_lowercase())
    .bind(form.country.trim())
    .bind(form.language.trim())
    .bind(tier.as_str())
    .bind(platinum_upgrade)
    .bind(form.global_entry)
    .bind(PerformanceStatus::Pending.as_str())
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to insert performance");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "There was an error submitting your performance. Please try again.",
        )
    })?;

    let message = if form.global_entry {
        "Your performance has been submitted and you're now competing globally!"
    } else {
        "Your performance has been submitted for review!"
    };

    Ok(Json(SubmissionResponse {
        performance: to_response(row)?,
        message: message.to_string(),
    }))
}

async fn list_performances(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<PerformanceResponse>> {
    let status_filter = match query.status.as_deref() {
        Some(value) => Some(
            PerformanceStatus::parse(value)
                .ok_or_else(|| {
                    json_error(
                        StatusCode::BAD_REQUEST,
                        format!("Unknown status filter: {value}"),
                    )
                })?
                .as_str(),
        ),
        None => None,
    };
    let email_filter = query
        .email
        .as_deref()
        .map(|email| email.trim().to_ascii_lowercase());

    let rows = sqlx::query_as::<_, PerformanceRow>(
        "SELECT * FROM performances
         WHERE ($1::TEXT IS NULL OR status = $1)
           AND ($2::TEXT IS NULL OR email = $2)
         ORDER BY submitted_at DESC",
    )
    .bind(status_filter)
    .bind(email_filter)
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to list performances");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load performances.",
        )
    })?;

    rows.into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

async fn get_performance(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<PerformanceResponse> {
    let row = fetch_performance(state.pool_ref(), id)
        .await
        .map_err(|err| {
            error!(?err, %id, "failed to load performance");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load the performance.",
            )
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Performance not found."))?;

    Ok(Json(to_response(row)?))
}

pub async fn fetch_performance(
    pool: &sqlx::PgPool,
    id: Uuid,
) -> sqlx::Result<Option<PerformanceRow>> {
    sqlx::query_as::<_, PerformanceRow>("SELECT * FROM performances WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub fn to_response(
    row: PerformanceRow,
) -> Result<PerformanceResponse, (StatusCode, Json<ApiMessage>)> {
    let status = PerformanceStatus::parse(&row.status).ok_or_else(|| {
        error!(id = %row.id, status = %row.status, "performance row carries unknown status");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    })?;
    let feedback_tier = FeedbackTier::parse(&row.feedback_tier).ok_or_else(|| {
        error!(id = %row.id, tier = %row.feedback_tier, "performance row carries unknown tier");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    })?;

    Ok(PerformanceResponse {
        id: row.id,
        performer_name: row.performer_name,
        email: row.email,
        age: row.age,
        performance_title: row.performance_title,
        performance_description: row.performance_description,
        video_url: row.video_url,
        dance_genre: row.dance_genre,
        country: row.country,
        language: row.language,
        feedback_tier,
        platinum_upgrade: row.platinum_upgrade,
        global_entry: row.global_entry,
        status,
        submitted_at: row.submitted_at,
    })
}

/// Local submission gate. The empty video reference is the hard stop the
/// client also enforces; the rest mirrors the required-field semantics of
/// the submission form.
fn validate_submission(form: &SubmitPerformanceRequest) -> Result<(), &'static str> {
    if form.video_url.trim().is_empty() {
        return Err("A performance video is required before submitting.");
    }
    if form.performer_name.trim().is_empty() {
        return Err("Your full name is required.");
    }
    if form.email.trim().is_empty() {
        return Err("An email address is required.");
    }
    if form.age <= 0 {
        return Err("A valid age is required.");
    }
    if form.country.trim().is_empty() {
        return Err("Your country is required.");
    }
    if form.performance_title.trim().is_empty() {
        return Err("A performance title is required.");
    }
    if form.performance_description.trim().is_empty() {
        return Err("A performance description is required.");
    }
    let genre = form.dance_genre.to_ascii_lowercase();
    if !DANCE_GENRES.contains(&genre.as_str()) {
        return Err("Please choose a dance genre from the list.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> SubmitPerformanceRequest {
        SubmitPerformanceRequest {
            performer_name: "Ana Reyes".to_string(),
            email: "ana@example.com".to_string(),
            age: 21,
            country: "Spain".to_string(),
            language: "Spanish".to_string(),
            performance_title: "Noche de Jazz".to_string(),
            performance_description: "A jazz solo set to a live trio recording.".to_string(),
            video_url: "https://example.com/v.mp4".to_string(),
            dance_genre: "jazz".to_string(),
            feedback_type: "free".to_string(),
            judge_type: "standard".to_string(),
            global_entry: false,
        }
    }

    #[test]
    fn accepts_a_complete_submission() {
        assert!(validate_submission(&valid_form()).is_ok());
    }

    #[test]
    fn missing_video_is_the_hard_gate() {
        let mut form = valid_form();
        form.video_url = "   ".to_string();
        assert_eq!(
            validate_submission(&form),
            Err("A performance video is required before submitting.")
        );
    }

    #[test]
    fn unknown_genre_is_rejected() {
        let mut form = valid_form();
        form.dance_genre = "breakdance".to_string();
        assert!(validate_submission(&form).is_err());

        form.dance_genre = "Hip-Hop".to_string();
        assert!(validate_submission(&form).is_ok());
    }

    #[test]
    fn tier_and_platinum_derive_from_ui_choices() {
        let form = valid_form();
        assert_eq!(FeedbackTier::from_choice(&form.feedback_type), FeedbackTier::Free);
        assert!(!form.judge_type.eq_ignore_ascii_case("platinum"));

        let mut premium = valid_form();
        premium.feedback_type = "premium".to_string();
        premium.judge_type = "platinum".to_string();
        assert_eq!(
            FeedbackTier::from_choice(&premium.feedback_type),
            FeedbackTier::Paid
        );
        assert!(premium.judge_type.eq_ignore_ascii_case("platinum"));
    }
}
