use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::{Multipart, Path as AxumPath, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use serde::Serialize;
use tokio::fs as tokio_fs;
use tracing::error;
use uuid::Uuid;

use crate::web::{
    ApiMessage, ApiResult, AppState, FileNaming, UploadPolicy, content_type_for,
    ensure_storage_root, json_error, process_upload, serve_media_file,
};

const STORAGE_ROOT: &str = "storage/uploads";
const ALLOWED_MEDIA_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "jpg", "jpeg", "png"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/uploads", post(upload_media))
        .route("/media/:batch/:filename", get(serve_media))
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
    original_name: String,
    file_size: u64,
}

/// Accepts one performance video or poster image and returns its public URL.
/// Each upload lands in its own batch directory so names never collide.
async fn upload_media(
    State(_state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<UploadResponse> {
    ensure_storage_root(STORAGE_ROOT).await.map_err(|err| {
        error!(?err, "failed to prepare upload storage");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed.")
    })?;

    let batch = Uuid::new_v4();
    let batch_dir = PathBuf::from(STORAGE_ROOT).join(batch.to_string());

    let policy = UploadPolicy {
        field_name: "file",
        allowed_extensions: ALLOWED_MEDIA_EXTENSIONS,
        naming: FileNaming::PreserveOriginal,
    };

    let outcome = match process_upload(multipart, &batch_dir, policy).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let _ = tokio_fs::remove_dir_all(&batch_dir).await;
            return Err(json_error(StatusCode::BAD_REQUEST, err.message().to_string()));
        }
    };

    Ok(Json(UploadResponse {
        url: format!("/media/{batch}/{}", outcome.file.stored_name),
        original_name: outcome.file.original_name,
        file_size: outcome.file.file_size,
    }))
}

async fn serve_media(
    State(_state): State<AppState>,
    AxumPath((batch, filename)): AxumPath<(Uuid, String)>,
) -> Result<Response, (StatusCode, Json<ApiMessage>)> {
    // Path captures cannot contain '/', but reject anything the sanitizer
    // would have refused to store.
    if filename != sanitize_filename::sanitize(&filename) {
        return Err(json_error(StatusCode::NOT_FOUND, "Media file not found."));
    }

    let path = PathBuf::from(STORAGE_ROOT)
        .join(batch.to_string())
        .join(&filename);

    serve_media_file(&path, content_type_for(&filename)).await
}
