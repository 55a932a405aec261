use axum::{
    Json,
    extract::{Path as AxumPath, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::error;

use crate::config::{self, FeedbackCategory};
use crate::web::{ApiMessage, ApiResult, AppState, auth, json_error};

#[derive(Deserialize)]
pub(crate) struct UpdateBankRequest {
    sentences: Vec<String>,
}

/// Replace a category's sentence bank. Open drafts keep validating against
/// the reloaded bank from the next toggle on.
pub(crate) async fn update_bank(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(category): AxumPath<String>,
    Json(form): Json<UpdateBankRequest>,
) -> ApiResult<ApiMessage> {
    let _admin = auth::require_admin_or_json_error(&state, &jar)
        .await?;

    let category = FeedbackCategory::parse(&category)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Unknown rubric category."))?;

    let sentences: Vec<String> = form
        .sentences
        .iter()
        .map(|sentence| sentence.trim().to_string())
        .collect();

    if sentences.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "A rubric bank needs at least one sentence.",
        ));
    }
    if sentences.iter().any(|sentence| sentence.is_empty()) {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "Rubric sentences cannot be empty.",
        ));
    }
    let mut deduped = sentences.clone();
    deduped.sort();
    deduped.dedup();
    if deduped.len() != sentences.len() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "Rubric sentences must be unique within a category.",
        ));
    }

    if let Err(err) = config::update_bank(state.pool_ref(), category, &sentences).await {
        error!(?err, category = category.key(), "failed to update rubric bank");
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update the rubric bank.",
        ));
    }

    if let Err(err) = state.reload_rubric().await {
        error!(?err, "failed to reload rubric settings after update");
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Bank saved, but reloading settings failed.",
        ));
    }

    Ok(Json(ApiMessage::new(format!(
        "Updated the {} bank.",
        category.label()
    ))))
}
