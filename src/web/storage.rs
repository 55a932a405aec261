use std::path::Path;

use anyhow::{Context, Result};
use axum::Json;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::web::{ApiMessage, json_error};

/// Ensure the storage directory exists.
pub async fn ensure_storage_root(path: &str) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to ensure storage root at {}", path))
}

/// Content type for the media files the platform accepts.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Serve a stored media file inline with its content type.
pub async fn serve_media_file(
    path: &Path,
    content_type: &str,
) -> Result<Response, (StatusCode, Json<ApiMessage>)> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(json_error(StatusCode::NOT_FOUND, "Media file not found."));
        }
        Err(err) => {
            error!(?err, file = %path.display(), "failed to read media file");
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read the media file.",
            ));
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_covers_accepted_media() {
        assert_eq!(content_type_for("solo.mp4"), "video/mp4");
        assert_eq!(content_type_for("Clip.MOV"), "video/quicktime");
        assert_eq!(content_type_for("poster.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("poster.png"), "image/png");
        assert_eq!(content_type_for("unknown.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn serves_existing_files_and_rejects_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"frames").await.unwrap();

        let response = serve_media_file(&path, "video/mp4").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let missing = dir.path().join("gone.mp4");
        let err = serve_media_file(&missing, "video/mp4").await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
