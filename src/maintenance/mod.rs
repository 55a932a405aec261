use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tokio::time::{Duration as TokioDuration, sleep};
use tracing::{error, info};

use crate::web::AppState;

const CLEANUP_INTERVAL_MINUTES: u64 = 15;

/// Review drafts live in memory only; anything this old was abandoned.
pub const DRAFT_RETENTION_HOURS: i64 = 24;

pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let interval = TokioDuration::from_secs(CLEANUP_INTERVAL_MINUTES * 60);
        loop {
            if let Err(err) = run_cleanup_cycle(&state).await {
                error!(?err, "maintenance cycle failed");
            }
            sleep(interval).await;
        }
    });
}

async fn run_cleanup_cycle(state: &AppState) -> Result<()> {
    let expired_sessions = sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()")
        .execute(state.pool_ref())
        .await
        .context("failed to delete expired sessions")?
        .rows_affected();

    let cutoff = Utc::now() - Duration::hours(DRAFT_RETENTION_HOURS);
    let dropped_drafts = state.drafts().purge_opened_before(cutoff).await;

    if expired_sessions > 0 || dropped_drafts > 0 {
        info!(expired_sessions, dropped_drafts, "maintenance sweep completed");
    }

    Ok(())
}
