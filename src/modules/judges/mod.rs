use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::modules::performances::DANCE_GENRES;
use crate::web::{ApiMessage, ApiResult, AppState, JudgeRow, auth, json_error};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/judges", get(list_judges))
        .route("/api/judges/register", post(register))
        .route("/api/judges/me", get(my_profile).put(update_profile))
}

#[derive(Deserialize)]
pub struct RegisterJudgeRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub hourly_rate: i64,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub dance_genres: Vec<String>,
    #[serde(default)]
    pub is_platinum: bool,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    hourly_rate: i64,
    languages: Vec<String>,
    dance_genres: Vec<String>,
    #[serde(default)]
    is_platinum: bool,
}

#[derive(Serialize)]
pub struct JudgeProfileResponse {
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

impl From<JudgeRow> for JudgeProfileResponse {
    fn from(row: JudgeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            bio: row.bio,
            country: row.country,
            languages: row.languages,
            dance_genres: row.dance_genres,
            hourly_rate: row.hourly_rate,
            is_platinum: row.is_platinum,
            rating: row.rating,
            review_count: row.review_count,
            created_at: row.created_at,
        }
    }
}

const JUDGE_COLUMNS: &str = "id, name, email, bio, country, languages, dance_genres, hourly_rate, is_platinum, rating, review_count, created_at";

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<RegisterJudgeRequest>,
) -> Result<(CookieJar, Json<JudgeProfileResponse>), (StatusCode, Json<ApiMessage>)> {
    if let Err(message) = validate_registration(&form) {
        return Err(json_error(StatusCode::BAD_REQUEST, message));
    }

    let email = form.email.trim().to_ascii_lowercase();
    let languages = normalize_set(&form.languages);
    let dance_genres: Vec<String> = normalize_set(&form.dance_genres)
        .into_iter()
        .map(|genre| genre.to_ascii_lowercase())
        .collect();

    let password_hash = auth::hash_password(&form.password).map_err(|err| {
        error!(?err, "failed to hash password during registration");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed.")
    })?;

    let pool = state.pool();
    let result = sqlx::query_as::<_, JudgeRow>(&format!(
        "INSERT INTO judges (id, name, email, password_hash, bio, country, hourly_rate, languages, dance_genres, is_platinum)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {JUDGE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(form.name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(form.bio.trim())
    .bind(form.country.trim())
    .bind(form.hourly_rate.max(0))
    .bind(&languages)
    .bind(&dance_genres)
    .bind(form.is_platinum)
    .fetch_one(&pool)
    .await;

    let row = match result {
        Ok(row) => row,
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            return Err(json_error(
                StatusCode::CONFLICT,
                "A judge with this email is already registered.",
            ));
        }
        Err(err) => {
            error!(?err, "failed to insert judge");
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed.",
            ));
        }
    };

    // New judges are logged straight in.
    let token = auth::create_session(&pool, row.id).await.map_err(|err| {
        error!(?err, "failed to create session after registration");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed.")
    })?;

    Ok((
        jar.add(auth::session_cookie(token)),
        Json(JudgeProfileResponse::from(row)),
    ))
}

async fn list_judges(State(state): State<AppState>) -> ApiResult<Vec<JudgeProfileResponse>> {
    let rows = sqlx::query_as::<_, JudgeRow>(&format!(
        "SELECT {JUDGE_COLUMNS} FROM judges ORDER BY is_platinum DESC, rating DESC, name"
    ))
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to list judges");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load judges.")
    })?;

    Ok(Json(rows.into_iter().map(JudgeProfileResponse::from).collect()))
}

async fn my_profile(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<JudgeProfileResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    let row = fetch_judge(&state, judge.id).await?;
    Ok(Json(JudgeProfileResponse::from(row)))
}

async fn update_profile(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<UpdateProfileRequest>,
) -> ApiResult<JudgeProfileResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    let languages = normalize_set(&form.languages);
    let dance_genres = normalize_set(&form.dance_genres);
    if let Err(message) = validate_profile(&form.name, &languages, &dance_genres) {
        return Err(json_error(StatusCode::BAD_REQUEST, message));
    }

    let row = sqlx::query_as::<_, JudgeRow>(&format!(
        "UPDATE judges
         SET name = $2, bio = $3, country = $4, hourly_rate = $5, languages = $6, dance_genres = $7, is_platinum = $8, updated_at = NOW()
         WHERE id = $1
         RETURNING {JUDGE_COLUMNS}"
    ))
    .bind(judge.id)
    .bind(form.name.trim())
    .bind(form.bio.trim())
    .bind(form.country.trim())
    .bind(form.hourly_rate.max(0))
    .bind(&languages)
    .bind(&dance_genres)
    .bind(form.is_platinum)
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, judge_id = %judge.id, "failed to update judge profile");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update your profile.",
        )
    })?;

    Ok(Json(JudgeProfileResponse::from(row)))
}

async fn fetch_judge(
    state: &AppState,
    id: Uuid,
) -> Result<JudgeRow, (StatusCode, Json<ApiMessage>)> {
    sqlx::query_as::<_, JudgeRow>(&format!("SELECT {JUDGE_COLUMNS} FROM judges WHERE id = $1"))
        .bind(id)
        .fetch_optional(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, judge_id = %id, "failed to load judge");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load judge.")
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Judge not found."))
}

fn normalize_set(values: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !normalized.iter().any(|known| known == value) {
            normalized.push(value.to_string());
        }
    }
    normalized
}

fn validate_profile(
    name: &str,
    languages: &[String],
    dance_genres: &[String],
) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Your name is required.");
    }
    if languages.is_empty() {
        return Err("Select at least one language.");
    }
    if dance_genres.is_empty() {
        return Err("Select at least one dance genre.");
    }
    if dance_genres
        .iter()
        .any(|genre| !DANCE_GENRES.contains(&genre.to_ascii_lowercase().as_str()))
    {
        return Err("Dance genres must come from the platform's list.");
    }
    Ok(())
}

pub fn validate_registration(form: &RegisterJudgeRequest) -> Result<(), &'static str> {
    if form.name.trim().is_empty() {
        return Err("Your name is required.");
    }
    if form.email.trim().is_empty() {
        return Err("An email address is required.");
    }
    if form.password.is_empty() {
        return Err("A password is required.");
    }
    if form.password != form.confirm_password {
        return Err("Passwords do not match.");
    }
    let languages = normalize_set(&form.languages);
    let genres = normalize_set(&form.dance_genres);
    validate_profile(&form.name, &languages, &genres)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_registration() -> RegisterJudgeRequest {
        RegisterJudgeRequest {
            name: "Maya Chen".to_string(),
            email: "maya@example.com".to_string(),
            password: "correct horse".to_string(),
            confirm_password: "correct horse".to_string(),
            bio: "Former principal dancer, 12 years on the adjudication circuit.".to_string(),
            country: "Singapore".to_string(),
            hourly_rate: 90,
            languages: vec!["English".to_string(), "Mandarin".to_string()],
            dance_genres: vec!["ballet".to_string(), "contemporary".to_string()],
            is_platinum: true,
        }
    }

    #[test]
    fn accepts_a_complete_registration() {
        assert!(validate_registration(&valid_registration()).is_ok());
    }

    #[test]
    fn password_mismatch_is_rejected() {
        let mut form = valid_registration();
        form.confirm_password = "something else".to_string();
        assert_eq!(
            validate_registration(&form),
            Err("Passwords do not match.")
        );
    }

    #[test]
    fn at_least_one_language_and_genre_required() {
        let mut form = valid_registration();
        form.languages = vec!["  ".to_string()];
        assert_eq!(
            validate_registration(&form),
            Err("Select at least one language.")
        );

        let mut form = valid_registration();
        form.dance_genres.clear();
        assert_eq!(
            validate_registration(&form),
            Err("Select at least one dance genre.")
        );
    }

    #[test]
    fn genres_must_come_from_the_platform_list() {
        let mut form = valid_registration();
        form.dance_genres = vec!["krumping".to_string()];
        assert_eq!(
            validate_registration(&form),
            Err("Dance genres must come from the platform's list.")
        );
    }

    #[test]
    fn normalize_set_trims_and_dedupes() {
        let values = vec![
            " English ".to_string(),
            "English".to_string(),
            "".to_string(),
            "French".to_string(),
        ];
        assert_eq!(normalize_set(&values), vec!["English", "French"]);
    }
}
