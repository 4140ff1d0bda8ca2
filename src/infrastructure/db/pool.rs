use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::log::LevelFilter;
use tracing::{info, warn};

pub type DbPool = Pool<Postgres>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
}

fn connect_options(connection_string: &str) -> Result<PgConnectOptions, sqlx::Error> {
    Ok(PgConnectOptions::from_str(connection_string)?.log_statements(LevelFilter::Debug))
}

pub async fn connect_to_db(connection_string: &str) -> Result<DbPool, sqlx::Error> {
    let pool = pool_options()
        .connect_with(connect_options(connection_string)?)
        .await?;

    info!("✅ Connected to PostgreSQL");
    Ok(pool)
}

/// Pool that opens connections on first use.
pub fn connect_lazy(connection_string: &str) -> Result<DbPool, sqlx::Error> {
    Ok(pool_options().connect_lazy_with(connect_options(connection_string)?))
}

/// Blocks until PostgreSQL accepts connections and answers a trivial query.
pub async fn wait_for_db(
    connection_string: &str,
    attempts: u32,
    delay: Duration,
) -> Result<DbPool, sqlx::Error> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match connect_to_db(connection_string).await {
            Ok(pool) => sqlx::query("SELECT 1").execute(&pool).await.map(|_| pool),
            Err(e) => Err(e),
        };

        match result {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < attempts => {
                warn!(
                    "PostgreSQL not ready (attempt {}/{}): {}",
                    attempt, attempts, e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await?;
    info!("✅ Database migrations applied");
    Ok(())
}
