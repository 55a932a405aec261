use axum::{
    Json, Router,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::modules::performances;
use crate::web::{ApiResult, AppState, RequestStatus, auth, json_error};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/requests", post(create_request).get(list_requests))
        .route("/api/requests/:id/accept", post(accept_request))
        .route("/api/requests/:id/decline", post(decline_request))
}

#[derive(Deserialize)]
struct CreateRequestForm {
    performance_id: Uuid,
    judge_id: Uuid,
    #[serde(default)]
    message: String,
}

#[derive(sqlx::FromRow)]
struct FeedbackRequestRow {
    id: Uuid,
    performance_id: Uuid,
    judge_id: Uuid,
    message: String,
    status: String,
    requested_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct FeedbackRequestResponse {
    id: Uuid,
    performance_id: Uuid,
    judge_id: Uuid,
    message: String,
    status: RequestStatus,
    requested_at: DateTime<Utc>,
}

/// Listing shape for the judge dashboard: the request joined with the
/// performance fields it is about.
#[derive(sqlx::FromRow)]
struct RequestListRow {
    id: Uuid,
    performance_id: Uuid,
    message: String,
    status: String,
    requested_at: DateTime<Utc>,
    performance_title: String,
    performer_name: String,
    performance_description: String,
    video_url: String,
}

#[derive(Serialize)]
struct RequestListResponse {
    id: Uuid,
    performance_id: Uuid,
    message: String,
    status: RequestStatus,
    requested_at: DateTime<Utc>,
    performance_title: String,
    performer_name: String,
    performance_description: String,
    video_url: String,
}

async fn create_request(
    State(state): State<AppState>,
    Json(form): Json<CreateRequestForm>,
) -> ApiResult<FeedbackRequestResponse> {
    let pool = state.pool();

    performances::fetch_performance(&pool, form.performance_id)
        .await
        .map_err(|err| {
            error!(?err, performance_id = %form.performance_id, "failed to load performance for request");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create the request.",
            )
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Performance not found."))?;

    let judge_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM judges WHERE id = $1)")
        .bind(form.judge_id)
        .fetch_one(&pool)
        .await
        .map_err(|err| {
            error!(?err, judge_id = %form.judge_id, "failed to check judge for request");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create the request.",
            )
        })?;
    if !judge_exists {
        return Err(json_error(StatusCode::NOT_FOUND, "Judge not found."));
    }

    let row = sqlx::query_as::<_, FeedbackRequestRow>(
        "INSERT INTO feedback_requests (id, performance_id, judge_id, message, status)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(form.performance_id)
    .bind(form.judge_id)
    .bind(form.message.trim())
    .bind(RequestStatus::Pending.as_str())
    .fetch_one(&pool)
    .await
    .map_err(|err| {
        error!(?err, "failed to insert feedback request");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create the request.",
        )
    })?;

    Ok(Json(to_response(row)?))
}

async fn list_requests(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<Vec<RequestListResponse>> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    let rows = sqlx::query_as::<_, RequestListRow>(
        "SELECT fr.id, fr.performance_id, fr.message, fr.status, fr.requested_at,
                p.performance_title, p.performer_name, p.performance_description, p.video_url
         FROM feedback_requests fr
         JOIN performances p ON p.id = fr.performance_id
         WHERE fr.judge_id = $1
         ORDER BY fr.requested_at DESC",
    )
    .bind(judge.id)
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, judge_id = %judge.id, "failed to list feedback requests");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load feedback requests.",
        )
    })?;

    rows.into_iter()
        .map(|row| {
            let status = parse_status(&row.status, row.id)?;
            Ok(RequestListResponse {
                id: row.id,
                performance_id: row.performance_id,
                message: row.message,
                status,
                requested_at: row.requested_at,
                performance_title: row.performance_title,
                performer_name: row.performer_name,
                performance_description: row.performance_description,
                video_url: row.video_url,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

async fn accept_request(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<FeedbackRequestResponse> {
    resolve_request(state, jar, id, RequestStatus::Accepted).await
}

async fn decline_request(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<FeedbackRequestResponse> {
    resolve_request(state, jar, id, RequestStatus::Declined).await
}

/// The single transition a request ever makes. Only the addressed judge may
/// resolve it, and only while it is still pending; the linked performance
/// is never touched.
async fn resolve_request(
    state: AppState,
    jar: CookieJar,
    id: Uuid,
    target: RequestStatus,
) -> ApiResult<FeedbackRequestResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;
    let pool = state.pool();

    let row = sqlx::query_as::<_, FeedbackRequestRow>(
        "SELECT * FROM feedback_requests WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|err| {
        error!(?err, request_id = %id, "failed to load feedback request");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update the request.",
        )
    })?
    .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Feedback request not found."))?;

    if row.judge_id != judge.id {
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "This request is addressed to another judge.",
        ));
    }

    let current = parse_status(&row.status, row.id)?;
    if current.is_terminal() {
        return Err(json_error(
            StatusCode::CONFLICT,
            "This request has already been resolved.",
        ));
    }

    let updated = sqlx::query_as::<_, FeedbackRequestRow>(
        "UPDATE feedback_requests SET status = $2 WHERE id = $1 AND status = $3 RETURNING *",
    )
    .bind(id)
    .bind(target.as_str())
    .bind(RequestStatus::Pending.as_str())
    .fetch_optional(&pool)
    .await
    .map_err(|err| {
        error!(?err, request_id = %id, "failed to update feedback request");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update the request.",
        )
    })?
    .ok_or_else(|| {
        json_error(
            StatusCode::CONFLICT,
            "This request has already been resolved.",
        )
    })?;

    Ok(Json(to_response(updated)?))
}

fn to_response(
    row: FeedbackRequestRow,
) -> Result<FeedbackRequestResponse, (StatusCode, Json<crate::web::ApiMessage>)> {
    let status = parse_status(&row.status, row.id)?;
    Ok(FeedbackRequestResponse {
        id: row.id,
        performance_id: row.performance_id,
        judge_id: row.judge_id,
        message: row.message,
        status,
        requested_at: row.requested_at,
    })
}

fn parse_status(
    value: &str,
    id: Uuid,
) -> Result<RequestStatus, (StatusCode, Json<crate::web::ApiMessage>)> {
    RequestStatus::parse(value).ok_or_else(|| {
        error!(request_id = %id, status = value, "feedback request carries unknown status");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    })
}
