pub mod auth;
pub mod models;
pub mod responses;
pub mod router;
pub mod state;
pub mod status;
pub mod storage;
pub mod uploads;

pub use auth::{AuthJudge, JsonAuthError, SESSION_COOKIE, SESSION_TTL_DAYS};
pub use models::JudgeRow;
pub use responses::{ApiMessage, ApiResult, json_error};
pub use state::AppState;
pub use status::{FeedbackTier, PerformanceStatus, RequestStatus};
pub use storage::{content_type_for, ensure_storage_root, serve_media_file};
pub use uploads::{FileNaming, SavedFile, UploadOutcome, UploadPolicy, process_upload};
