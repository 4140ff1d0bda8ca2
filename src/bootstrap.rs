use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{self, DbPool};
use crate::infrastructure::storage::media::MediaStorage;
use crate::modules::auth::service::AuthService;
use crate::state::AppState;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

const DB_RETRY_DELAY: Duration = Duration::from_secs(2);

pub async fn wait_for_db(config: &AppConfig) -> Result<DbPool> {
    info!("Waiting for PostgreSQL ({} attempts)", config.db_wait_attempts);
    pool::wait_for_db(&config.database_url, config.db_wait_attempts, DB_RETRY_DELAY)
        .await
        .context("PostgreSQL did not become ready")
}

pub async fn prepare_media(config: &AppConfig) -> Result<()> {
    MediaStorage::new(config.media_root.clone())
        .ensure_dirs()
        .await
        .with_context(|| format!("Could not prepare media root {}", config.media_root.display()))
}

/// Creates the staff account from `DJANGO_SUPERUSER_*` unless it already exists.
pub async fn create_superuser(state: &AppState) -> Result<()> {
    let Some(su) = &state.config.superuser else {
        warn!("DJANGO_SUPERUSER_USERNAME/PASSWORD/EMAIL incomplete, skipping superuser");
        return Ok(());
    };

    AuthService::ensure_superuser(state, &su.username, &su.email, &su.password).await?;
    Ok(())
}

/// Startup sequence of the web process. Migrations and the superuser only run
/// when `RUN_MIGRATIONS` is set.
pub async fn run(state: &AppState) -> Result<()> {
    prepare_media(&state.config).await?;

    if state.config.run_migrations {
        pool::run_migrations(&state.db).await.context("Migrations failed")?;
        create_superuser(state).await?;
    } else {
        info!("RUN_MIGRATIONS not set, skipping migrations");
    }
    Ok(())
}
