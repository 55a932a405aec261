use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::web::{ApiMessage, AppState, json_error};

#[derive(Clone, sqlx::FromRow)]
pub struct DbJudgeAuth {
    pub id: Uuid,
    pub password_hash: String,
}

/// Identity resolved from a session cookie; passed explicitly to every
/// handler that acts on behalf of a judge.
#[derive(Clone, sqlx::FromRow)]
pub struct AuthJudge {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

pub const SESSION_COOKIE: &str = "ldl_session";
pub const SESSION_TTL_DAYS: i64 = 7;

/// Auth failure shaped for the JSON API.
pub struct JsonAuthError {
    pub status: StatusCode,
    pub message: &'static str,
}

impl From<JsonAuthError> for (StatusCode, Json<ApiMessage>) {
    fn from(err: JsonAuthError) -> Self {
        json_error(err.status, err.message)
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<AuthJudge> for SessionResponse {
    fn from(judge: AuthJudge) -> Self {
        Self {
            id: judge.id,
            name: judge.name,
            email: judge.email,
            is_admin: judge.is_admin,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), (StatusCode, Json<ApiMessage>)> {
    let email = form.email.trim().to_ascii_lowercase();
    let pool = state.pool();

    let auth_row = match fetch_judge_auth_by_email(&pool, &email).await {
        Ok(Some(row)) => row,
        Ok(None) => return Err(invalid_credentials()),
        Err(err) => {
            error!(?err, "failed to fetch judge during login");
            return Err(server_error());
        }
    };

    if !verify_password(&form.password, &auth_row.password_hash) {
        return Err(invalid_credentials());
    }

    let token = match create_session(&pool, auth_row.id).await {
        Ok(token) => token,
        Err(err) => {
            error!(?err, "failed to create session");
            return Err(server_error());
        }
    };

    let judge = match fetch_judge_by_session(&pool, token).await {
        Ok(Some(judge)) => judge,
        _ => return Err(server_error()),
    };

    Ok((
        jar.add(session_cookie(token)),
        Json(SessionResponse::from(judge)),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiMessage>) {
    let mut jar = jar;

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(token) = Uuid::parse_str(cookie.value()) {
            if let Err(err) = sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(token)
                .execute(state.pool_ref())
                .await
            {
                error!(?err, "failed to remove session during logout");
            }
        }
    }

    jar = jar.remove(removal_cookie());

    (jar, Json(ApiMessage::new("Logged out.")))
}

pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ApiMessage>)> {
    let judge = current_judge_or_json_error(&state, &jar)
        .await?;
    Ok(Json(SessionResponse::from(judge)))
}

/// Resolve the acting judge from the session cookie, or produce the JSON
/// 401 the API handlers return.
pub async fn current_judge_or_json_error(
    state: &AppState,
    jar: &CookieJar,
) -> Result<AuthJudge, JsonAuthError> {
    let token = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
        .ok_or(JsonAuthError {
            status: StatusCode::UNAUTHORIZED,
            message: "Judge login required.",
        })?;

    match fetch_judge_by_session(&state.pool(), token).await {
        Ok(Some(judge)) => Ok(judge),
        Ok(None) => Err(JsonAuthError {
            status: StatusCode::UNAUTHORIZED,
            message: "Session expired. Please log in again.",
        }),
        Err(err) => {
            error!(?err, "failed to validate session");
            Err(JsonAuthError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Internal server error.",
            })
        }
    }
}

pub async fn require_admin_or_json_error(
    state: &AppState,
    jar: &CookieJar,
) -> Result<AuthJudge, JsonAuthError> {
    let judge = current_judge_or_json_error(state, jar).await?;
    if !judge.is_admin {
        return Err(JsonAuthError {
            status: StatusCode::FORBIDDEN,
            message: "Administrator access required.",
        });
    }
    Ok(judge)
}

/// Insert a session row and return its token. Shared by login and by
/// registration, which logs the new judge straight in.
pub async fn create_session(pool: &PgPool, judge_id: Uuid) -> sqlx::Result<Uuid> {
    let token = Uuid::new_v4();
    let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);

    sqlx::query("INSERT INTO sessions (id, judge_id, expires_at) VALUES ($1, $2, $3)")
        .bind(token)
        .bind(judge_id)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

pub fn session_cookie(token: Uuid) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));
    cookie
}

fn removal_cookie() -> Cookie<'static> {
    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    removal
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn fetch_judge_auth_by_email(
    pool: &PgPool,
    email: &str,
) -> sqlx::Result<Option<DbJudgeAuth>> {
    sqlx::query_as::<_, DbJudgeAuth>("SELECT id, password_hash FROM judges WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_judge_by_session(pool: &PgPool, token: Uuid) -> sqlx::Result<Option<AuthJudge>> {
    sqlx::query_as::<_, AuthJudge>(
        "SELECT judges.id, judges.name, judges.email, judges.is_admin FROM sessions JOIN judges ON judges.id = sessions.judge_id WHERE sessions.id = $1 AND sessions.expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

fn invalid_credentials() -> (StatusCode, Json<ApiMessage>) {
    json_error(StatusCode::UNAUTHORIZED, "Invalid email or password.")
}

fn server_error() -> (StatusCode, Json<ApiMessage>) {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
}
