use std::{env, sync::Arc};

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{config::RubricSettings, modules::review::DraftStore};

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    rubric: Arc<RwLock<RubricSettings>>,
    drafts: DraftStore,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        RubricSettings::ensure_defaults(&pool)
            .await
            .context("failed to seed default rubric banks")?;
        let rubric = RubricSettings::load(&pool)
            .await
            .context("failed to load rubric settings")?;

        Ok(Self {
            pool,
            rubric: Arc::new(RwLock::new(rubric)),
            drafts: DraftStore::new(),
        })
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM judges WHERE is_admin = TRUE)")
                .fetch_one(&self.pool)
                .await
                .context("failed to verify admin presence")?;

        if !has_admin {
            let password_hash = crate::web::auth::hash_password("change-me")
                .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

            sqlx::query(
                "INSERT INTO judges (id, name, email, password_hash, languages, dance_genres, is_admin) VALUES ($1, $2, $3, $4, $5, $6, TRUE)",
            )
            .bind(Uuid::new_v4())
            .bind("Platform Admin")
            .bind("admin@lovedancelive.com")
            .bind(password_hash)
            .bind(vec!["English".to_string()])
            .bind(vec!["contemporary".to_string()])
            .execute(&self.pool)
            .await
            .context("failed to insert seed admin judge")?;

            info!(
                "Seeded default admin judge 'admin@lovedancelive.com' (password: 'change-me'). Update it promptly."
            );
        }

        Ok(())
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub async fn rubric_settings(&self) -> RubricSettings {
        let guard = self.rubric.read().await;
        guard.clone()
    }

    pub async fn reload_rubric(&self) -> Result<()> {
        let latest = RubricSettings::load(&self.pool)
            .await
            .context("failed to reload rubric settings")?;
        let mut guard = self.rubric.write().await;
        *guard = latest;
        Ok(())
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }
}
