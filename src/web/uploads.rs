use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::extract::Multipart;
use tokio::{fs::File, io::AsyncWriteExt};

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting an uploaded file.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Describes how the stored filename is generated.
#[derive(Debug, Clone, Copy)]
pub enum FileNaming<'a> {
    /// Keep the sanitized original filename.
    PreserveOriginal,
    /// Prefix the sanitized original filename.
    Prefixed { prefix: &'a str },
}

impl<'a> FileNaming<'a> {
    fn build_name(&self, sanitized_original: &str) -> String {
        match self {
            FileNaming::PreserveOriginal => sanitized_original.to_string(),
            FileNaming::Prefixed { prefix } => format!("{}{}", prefix, sanitized_original),
        }
    }
}

/// Expectations for the single file field of a multipart form.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a [&'a str],
    pub naming: FileNaming<'a>,
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

/// Output of the shared upload processor: the stored file plus any plain
/// text fields that accompanied it.
#[derive(Debug)]
pub struct UploadOutcome {
    pub file: SavedFile,
    pub text_fields: HashMap<String, String>,
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> UploadResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| UploadError::new(format!("Could not create the upload directory: {err}")))
}

/// Parses a multipart form that carries exactly one file, persisting it
/// according to the policy. The caller provides a unique destination
/// directory (one per upload batch).
pub async fn process_upload(
    mut multipart: Multipart,
    dest_dir: &Path,
    policy: UploadPolicy<'_>,
) -> UploadResult<UploadOutcome> {
    ensure_directory(dest_dir).await?;

    let mut text_fields: HashMap<String, String> = HashMap::new();
    let mut saved: Option<SavedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("Failed to parse the upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field.text().await.map_err(|err| {
                UploadError::new(format!("Failed to read field `{field_name}`: {err}"))
            })?;
            text_fields.insert(field_name, value);
            continue;
        }

        if field_name != policy.field_name {
            return Err(UploadError::new(format!(
                "Unsupported file field: `{field_name}`"
            )));
        }

        if saved.is_some() {
            return Err(UploadError::new(format!(
                "Field `{}` accepts a single file",
                policy.field_name
            )));
        }

        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let extension = normalized_extension(&file_name);

        if !policy
            .allowed_extensions
            .iter()
            .any(|allowed| *allowed == extension)
        {
            return Err(UploadError::new(format!(
                "File type `{extension}` is not supported for `{}`",
                policy.field_name
            )));
        }

        let mut sanitized = sanitize_filename::sanitize(&file_name);
        if sanitized.is_empty() {
            sanitized = fallback_name(&extension);
        }

        let stored_name = policy.naming.build_name(&sanitized);
        let stored_path = dest_dir.join(&stored_name);
        let mut file = File::create(&stored_path)
            .await
            .map_err(|err| UploadError::new(format!("Failed to save the file: {err}")))?;

        let mut total_bytes: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::new(format!("Failed to read the upload: {err}")))?
        {
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|err| UploadError::new(format!("Failed to write the file: {err}")))?;
        }
        file.flush()
            .await
            .map_err(|err| UploadError::new(format!("Failed to flush the file: {err}")))?;

        saved = Some(SavedFile {
            original_name: file_name,
            stored_name,
            stored_path,
            file_size: total_bytes,
        });
    }

    let file = saved.ok_or_else(|| {
        UploadError::new(format!("Field `{}` requires a file", policy.field_name))
    })?;

    Ok(UploadOutcome { file, text_fields })
}

fn normalized_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn fallback_name(extension: &str) -> String {
    if extension.is_empty() {
        "upload".to_string()
    } else {
        format!("upload.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_preserve_original() {
        let naming = FileNaming::PreserveOriginal;
        assert_eq!(naming.build_name("clip.mp4"), "clip.mp4".to_string());
    }

    #[test]
    fn naming_prefixed() {
        let naming = FileNaming::Prefixed { prefix: "poster_" };
        assert_eq!(naming.build_name("event.png"), "poster_event.png");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(normalized_extension("Solo Final.MP4"), "mp4");
        assert_eq!(normalized_extension("archive.tar.gz"), "gz");
        assert_eq!(normalized_extension("no-extension"), "");
    }

    #[test]
    fn fallback_name_keeps_extension() {
        assert_eq!(fallback_name("mp4"), "upload.mp4");
        assert_eq!(fallback_name(""), "upload");
    }

    #[tokio::test]
    async fn ensure_directory_creates_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("batch").join("files");
        ensure_directory(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
