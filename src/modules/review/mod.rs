use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

mod admin;
pub mod composer;

use crate::config::FeedbackCategory;
use crate::modules::performances;
use crate::web::{
    ApiMessage, ApiResult, AppState, PerformanceStatus, auth, json_error,
};
use composer::{ComposedFeedback, ComposerError, FeedbackComposer};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reviews", post(open_draft))
        .route("/api/reviews/:id", get(draft_state).delete(cancel_draft))
        .route("/api/reviews/:id/score", put(set_score))
        .route("/api/reviews/:id/sentences", post(toggle_sentence))
        .route("/api/reviews/:id/comment", put(set_comment))
        .route("/api/reviews/:id/video", put(set_video))
        .route("/api/reviews/:id/submit", post(submit_draft))
        .route("/api/performances/:id/feedback", get(performance_feedback))
        .route("/api/rubric", get(rubric))
        .route("/api/rubric/:category", put(admin::update_bank))
}

/// One judge's in-progress evaluation. Drafts live only in memory:
/// cancelling one persists nothing (the performance keeps whatever status
/// it already reached).
pub struct ReviewDraft {
    pub id: Uuid,
    pub performance_id: Uuid,
    pub judge_id: Uuid,
    pub judge_name: String,
    pub composer: FeedbackComposer,
    pub video_feedback_url: Option<String>,
    pub opened_at: DateTime<Utc>,
}

/// Shared in-memory store of open review drafts, keyed by draft id.
#[derive(Clone, Default)]
pub struct DraftStore {
    inner: Arc<RwLock<HashMap<Uuid, ReviewDraft>>>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, draft: ReviewDraft) {
        let mut guard = self.inner.write().await;
        guard.insert(draft.id, draft);
    }

    pub async fn remove(&self, id: Uuid) -> Option<ReviewDraft> {
        let mut guard = self.inner.write().await;
        guard.remove(&id)
    }

    /// Drop drafts opened before the cutoff. Submitted drafts are kept only
    /// as an idempotence latch, so they age out the same way.
    pub async fn purge_opened_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, draft| draft.opened_at >= cutoff);
        before - guard.len()
    }
}

#[derive(Deserialize)]
struct OpenDraftRequest {
    performance_id: Uuid,
}

#[derive(Deserialize)]
struct ScoreRequest {
    category: FeedbackCategory,
    value: f64,
}

#[derive(Deserialize)]
struct SentenceRequest {
    category: FeedbackCategory,
    sentence: String,
}

#[derive(Deserialize)]
struct CommentRequest {
    category: FeedbackCategory,
    comment: String,
}

#[derive(Deserialize)]
struct VideoRequest {
    video_feedback_url: Option<String>,
}

#[derive(Serialize)]
struct CategoryState {
    category: FeedbackCategory,
    label: &'static str,
    score: f64,
    selected_sentences: Vec<String>,
    comment: String,
    complete: bool,
}

#[derive(Serialize)]
struct DraftStateResponse {
    id: Uuid,
    performance_id: Uuid,
    judge_name: String,
    categories: Vec<CategoryState>,
    video_feedback_url: Option<String>,
    submitted: bool,
    complete: bool,
}

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: Uuid,
    performance_id: Uuid,
    judge_id: Uuid,
    judge_name: String,
    technique: i16,
    musicality: i16,
    performance_expression: i16,
    choreography: i16,
    overall_impression: i16,
    overall: i16,
    text_feedback: String,
    video_feedback_url: Option<String>,
    submitted_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct FeedbackResponse {
    id: Uuid,
    performance_id: Uuid,
    judge_id: Uuid,
    judge_name: String,
    technique: i16,
    musicality: i16,
    performance_expression: i16,
    choreography: i16,
    overall_impression: i16,
    overall: i16,
    aggregate_score: f64,
    text_feedback: String,
    video_feedback_url: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl From<FeedbackRow> for FeedbackResponse {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            performance_id: row.performance_id,
            judge_id: row.judge_id,
            judge_name: row.judge_name,
            technique: row.technique,
            musicality: row.musicality,
            performance_expression: row.performance_expression,
            choreography: row.choreography,
            overall_impression: row.overall_impression,
            overall: row.overall,
            aggregate_score: row.overall as f64 / 10.0,
            text_feedback: row.text_feedback,
            video_feedback_url: row.video_feedback_url,
            submitted_at: row.submitted_at,
        }
    }
}

#[derive(Serialize)]
struct RubricCategoryResponse {
    category: FeedbackCategory,
    label: &'static str,
    sentences: Vec<String>,
}

async fn open_draft(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<OpenDraftRequest>,
) -> ApiResult<DraftStateResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;
    let pool = state.pool();

    let performance = performances::fetch_performance(&pool, form.performance_id)
        .await
        .map_err(|err| {
            error!(?err, performance_id = %form.performance_id, "failed to load performance for review");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load the performance.",
            )
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Performance not found."))?;

    if performance.status == PerformanceStatus::Reviewed.as_str() {
        return Err(json_error(
            StatusCode::CONFLICT,
            "This performance has already been reviewed.",
        ));
    }

    // Best effort: a judge opening a draft moves a pending performance to
    // in-progress. The review itself does not depend on this write.
    let transition = sqlx::query(
        "UPDATE performances SET status = $1 WHERE id = $2 AND status = $3",
    )
    .bind(PerformanceStatus::InProgress.as_str())
    .bind(form.performance_id)
    .bind(PerformanceStatus::Pending.as_str())
    .execute(&pool)
    .await;
    if let Err(err) = transition {
        warn!(?err, performance_id = %form.performance_id, "failed to mark performance in progress");
    }

    let draft = ReviewDraft {
        id: Uuid::new_v4(),
        performance_id: form.performance_id,
        judge_id: judge.id,
        judge_name: judge.name.clone(),
        composer: FeedbackComposer::new(),
        video_feedback_url: None,
        opened_at: Utc::now(),
    };
    let response = draft_response(&draft);
    state.drafts().insert(draft).await;

    Ok(Json(response))
}

async fn draft_state(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<DraftStateResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    let guard = state.drafts().inner.read().await;
    let draft = guard
        .get(&id)
        .ok_or_else(draft_not_found)?;
    require_owner(draft, judge.id)?;

    Ok(Json(draft_response(draft)))
}

async fn set_score(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
    Json(form): Json<ScoreRequest>,
) -> ApiResult<DraftStateResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    let mut guard = state.drafts().inner.write().await;
    let draft = guard.get_mut(&id).ok_or_else(draft_not_found)?;
    require_owner(draft, judge.id)?;

    draft
        .composer
        .set_score(form.category, form.value)
        .map_err(composer_error)?;

    Ok(Json(draft_response(draft)))
}

async fn toggle_sentence(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
    Json(form): Json<SentenceRequest>,
) -> ApiResult<DraftStateResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;
    let rubric = state.rubric_settings().await;

    let mut guard = state.drafts().inner.write().await;
    let draft = guard.get_mut(&id).ok_or_else(draft_not_found)?;
    require_owner(draft, judge.id)?;

    draft
        .composer
        .toggle_sentence(form.category, &form.sentence, rubric.bank(form.category))
        .map_err(composer_error)?;

    Ok(Json(draft_response(draft)))
}

async fn set_comment(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
    Json(form): Json<CommentRequest>,
) -> ApiResult<DraftStateResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    let mut guard = state.drafts().inner.write().await;
    let draft = guard.get_mut(&id).ok_or_else(draft_not_found)?;
    require_owner(draft, judge.id)?;

    draft
        .composer
        .set_comment(form.category, form.comment)
        .map_err(composer_error)?;

    Ok(Json(draft_response(draft)))
}

async fn set_video(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
    Json(form): Json<VideoRequest>,
) -> ApiResult<DraftStateResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    let mut guard = state.drafts().inner.write().await;
    let draft = guard.get_mut(&id).ok_or_else(draft_not_found)?;
    require_owner(draft, judge.id)?;

    if draft.composer.is_submitted() {
        return Err(composer_error(ComposerError::AlreadySubmitted));
    }
    draft.video_feedback_url = form
        .video_feedback_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    Ok(Json(draft_response(draft)))
}

async fn submit_draft(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<FeedbackResponse> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;
    let pool = state.pool();

    // The write guard is held across the persistence step so a doubled
    // submit click cannot race past the latch.
    let mut guard = state.drafts().inner.write().await;
    let draft = guard.get_mut(&id).ok_or_else(draft_not_found)?;
    require_owner(draft, judge.id)?;

    let composed = draft.composer.compose().map_err(composer_error)?;

    let row = persist_feedback(&pool, draft, &composed).await.map_err(|err| {
        error!(?err, draft_id = %id, "failed to persist feedback");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to submit feedback. Please try again.",
        )
    })?;

    draft.composer.mark_submitted();

    Ok(Json(FeedbackResponse::from(row)))
}

async fn cancel_draft(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<ApiMessage> {
    let judge = auth::current_judge_or_json_error(&state, &jar)
        .await?;

    {
        let guard = state.drafts().inner.read().await;
        let draft = guard.get(&id).ok_or_else(draft_not_found)?;
        require_owner(draft, judge.id)?;
    }
    state.drafts().remove(id).await;

    Ok(Json(ApiMessage::new("Draft discarded. Nothing was saved.")))
}

async fn performance_feedback(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<Vec<FeedbackResponse>> {
    let rows = sqlx::query_as::<_, FeedbackRow>(
        "SELECT * FROM feedback WHERE performance_id = $1 ORDER BY submitted_at DESC",
    )
    .bind(id)
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, performance_id = %id, "failed to load feedback");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load feedback.")
    })?;

    Ok(Json(rows.into_iter().map(FeedbackResponse::from).collect()))
}

async fn rubric(State(state): State<AppState>) -> ApiResult<Vec<RubricCategoryResponse>> {
    let settings = state.rubric_settings().await;
    let categories = FeedbackCategory::ALL
        .into_iter()
        .map(|category| RubricCategoryResponse {
            category,
            label: category.label(),
            sentences: settings.bank(category).to_vec(),
        })
        .collect();

    Ok(Json(categories))
}

/// Insert the feedback row and flip the performance to reviewed as one
/// transaction: neither write is observable without the other. A late
/// submission against an already-reviewed performance still records its
/// feedback; only the status write is skipped.
async fn persist_feedback(
    pool: &sqlx::PgPool,
    draft: &ReviewDraft,
    composed: &ComposedFeedback,
) -> anyhow::Result<FeedbackRow> {
    use anyhow::Context;

    let mut transaction = pool.begin().await.context("failed to begin transaction")?;

    let current_status: Option<String> =
        sqlx::query_scalar("SELECT status FROM performances WHERE id = $1 FOR UPDATE")
            .bind(draft.performance_id)
            .fetch_optional(&mut *transaction)
            .await
            .context("failed to lock performance row")?;
    let current_status =
        current_status.ok_or_else(|| anyhow::anyhow!("performance disappeared before submit"))?;

    let row = sqlx::query_as::<_, FeedbackRow>(
        "INSERT INTO feedback (id, performance_id, judge_id, judge_name, technique, musicality, performance_expression, choreography, overall_impression, overall, text_feedback, video_feedback_url)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(draft.performance_id)
    .bind(draft.judge_id)
    .bind(&draft.judge_name)
    .bind(composed.sub_scores[&FeedbackCategory::Technique])
    .bind(composed.sub_scores[&FeedbackCategory::Musicality])
    .bind(composed.sub_scores[&FeedbackCategory::PerformanceExpression])
    .bind(composed.sub_scores[&FeedbackCategory::Choreography])
    .bind(composed.sub_scores[&FeedbackCategory::OverallImpression])
    .bind(composed.overall)
    .bind(&composed.text)
    .bind(draft.video_feedback_url.as_deref())
    .fetch_one(&mut *transaction)
    .await
    .context("failed to insert feedback")?;

    if current_status != PerformanceStatus::Reviewed.as_str() {
        sqlx::query("UPDATE performances SET status = $1 WHERE id = $2")
            .bind(PerformanceStatus::Reviewed.as_str())
            .bind(draft.performance_id)
            .execute(&mut *transaction)
            .await
            .context("failed to mark performance reviewed")?;
    }

    sqlx::query("UPDATE judges SET review_count = review_count + 1, updated_at = NOW() WHERE id = $1")
        .bind(draft.judge_id)
        .execute(&mut *transaction)
        .await
        .context("failed to bump judge review count")?;

    transaction.commit().await.context("failed to commit feedback")?;

    Ok(row)
}

fn draft_response(draft: &ReviewDraft) -> DraftStateResponse {
    let categories: Vec<CategoryState> = draft
        .composer
        .categories()
        .map(|(category, feedback)| CategoryState {
            category,
            label: category.label(),
            score: feedback.score,
            selected_sentences: feedback.selected_sentences.clone(),
            comment: feedback.comment.clone(),
            complete: feedback.is_complete(),
        })
        .collect();
    let complete = categories.iter().all(|category| category.complete);

    DraftStateResponse {
        id: draft.id,
        performance_id: draft.performance_id,
        judge_name: draft.judge_name.clone(),
        categories,
        video_feedback_url: draft.video_feedback_url.clone(),
        submitted: draft.composer.is_submitted(),
        complete,
    }
}

fn require_owner(
    draft: &ReviewDraft,
    judge_id: Uuid,
) -> Result<(), (StatusCode, Json<ApiMessage>)> {
    if draft.judge_id != judge_id {
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "This review draft belongs to another judge.",
        ));
    }
    Ok(())
}

fn draft_not_found() -> (StatusCode, Json<ApiMessage>) {
    json_error(StatusCode::NOT_FOUND, "Review draft not found.")
}

fn composer_error(err: ComposerError) -> (StatusCode, Json<ApiMessage>) {
    let status = match err {
        ComposerError::AlreadySubmitted => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    json_error(status, err.to_string())
}
