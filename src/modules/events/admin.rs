use axum::{
    Json,
    extract::{Path as AxumPath, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use super::{EventKind, EventResponse, EventRow, EventStatus, to_response};
use crate::web::{ApiMessage, ApiResult, AppState, auth, json_error};

#[derive(Deserialize)]
pub(crate) struct EventForm {
    title: String,
    #[serde(default)]
    description: String,
    event_date: NaiveDate,
    #[serde(default)]
    location: String,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    poster_image_url: Option<String>,
    status: EventStatus,
    event_type: EventKind,
}

pub(crate) async fn create_event(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<EventForm>,
) -> ApiResult<EventResponse> {
    let _admin = auth::require_admin_or_json_error(&state, &jar)
        .await?;
    validate_event(&form)?;

    let row = sqlx::query_as::<_, EventRow>(
        "INSERT INTO events (id, title, description, event_date, location, price, poster_image_url, status, event_type)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(form.title.trim())
    .bind(form.description.trim())
    .bind(form.event_date)
    .bind(form.location.trim())
    .bind(form.price)
    .bind(poster_url(&form))
    .bind(form.status.as_str())
    .bind(form.event_type.as_str())
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to insert event");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save the event.")
    })?;

    Ok(Json(to_response(row)?))
}

pub(crate) async fn update_event(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
    Json(form): Json<EventForm>,
) -> ApiResult<EventResponse> {
    let _admin = auth::require_admin_or_json_error(&state, &jar)
        .await?;
    validate_event(&form)?;

    let row = sqlx::query_as::<_, EventRow>(
        "UPDATE events
         SET title = $2, description = $3, event_date = $4, location = $5, price = $6, poster_image_url = $7, status = $8, event_type = $9, updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(form.title.trim())
    .bind(form.description.trim())
    .bind(form.event_date)
    .bind(form.location.trim())
    .bind(form.price)
    .bind(poster_url(&form))
    .bind(form.status.as_str())
    .bind(form.event_type.as_str())
    .fetch_optional(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, event_id = %id, "failed to update event");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save the event.")
    })?
    .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Event not found."))?;

    Ok(Json(to_response(row)?))
}

pub(crate) async fn delete_event(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<ApiMessage> {
    let _admin = auth::require_admin_or_json_error(&state, &jar)
        .await?;

    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, event_id = %id, "failed to delete event");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete the event.",
            )
        })?;

    if result.rows_affected() == 0 {
        return Err(json_error(StatusCode::NOT_FOUND, "Event not found."));
    }

    Ok(Json(ApiMessage::new("Event deleted.")))
}

fn validate_event(form: &EventForm) -> Result<(), (StatusCode, Json<ApiMessage>)> {
    if form.title.trim().is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "An event title is required.",
        ));
    }
    if form.price < 0.0 {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "The price cannot be negative.",
        ));
    }
    Ok(())
}

fn poster_url(form: &EventForm) -> Option<String> {
    form.poster_image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}
