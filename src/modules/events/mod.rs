use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::error;
use uuid::Uuid;

mod admin;

use crate::web::{ApiResult, AppState, json_error};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events).post(admin::create_event))
        .route(
            "/api/events/:id",
            put(admin::update_event).delete(admin::delete_event),
        )
}

/// Publication state of an event; sold-out events stay listed with an
/// overlay on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Upcoming,
    Current,
    SoldOut,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Current => "current",
            EventStatus::SoldOut => "sold_out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upcoming" => Some(EventStatus::Upcoming),
            "current" => Some(EventStatus::Current),
            "sold_out" => Some(EventStatus::SoldOut),
            _ => None,
        }
    }
}

impl Serialize for EventStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        EventStatus::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown event status: {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Competition,
    Workshop,
    Masterclass,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Competition => "competition",
            EventKind::Workshop => "workshop",
            EventKind::Masterclass => "masterclass",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "competition" => Some(EventKind::Competition),
            "workshop" => Some(EventKind::Workshop),
            "masterclass" => Some(EventKind::Masterclass),
            _ => None,
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        EventKind::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown event type: {value}")))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub location: String,
    pub price: f64,
    pub poster_image_url: Option<String>,
    pub status: String,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub location: String,
    pub price: f64,
    pub poster_image_url: Option<String>,
    pub status: EventStatus,
    pub event_type: EventKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn to_response(
    row: EventRow,
) -> Result<EventResponse, (StatusCode, Json<crate::web::ApiMessage>)> {
    let status = EventStatus::parse(&row.status).ok_or_else(|| {
        error!(id = %row.id, status = %row.status, "event row carries unknown status");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    })?;
    let event_type = EventKind::parse(&row.event_type).ok_or_else(|| {
        error!(id = %row.id, event_type = %row.event_type, "event row carries unknown type");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    })?;

    Ok(EventResponse {
        id: row.id,
        title: row.title,
        description: row.description,
        event_date: row.event_date,
        location: row.location,
        price: row.price,
        poster_image_url: row.poster_image_url,
        status,
        event_type,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn list_events(State(state): State<AppState>) -> ApiResult<Vec<EventResponse>> {
    let rows = sqlx::query_as::<_, EventRow>("SELECT * FROM events ORDER BY event_date ASC")
        .fetch_all(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to list events");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load events.")
        })?;

    rows.into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_enums_round_trip() {
        assert_eq!(EventStatus::parse("sold_out"), Some(EventStatus::SoldOut));
        assert_eq!(EventStatus::SoldOut.as_str(), "sold_out");
        assert!(EventStatus::parse("cancelled").is_none());
        assert_eq!(EventKind::parse("masterclass"), Some(EventKind::Masterclass));
        assert!(EventKind::parse("recital").is_none());
    }
}
