use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod bootstrap;
mod common;
mod config;
mod docs;
mod infrastructure;
mod middleware;
mod modules;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::queue::redis_queue::{JobQueue, DEFAULT_QUEUE};
use infrastructure::redis::client::RedisService;
use state::AppState;

#[derive(Parser)]
#[command(name = "videoflix", version, about = "Videoflix streaming backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the startup bootstrap, then serve the HTTP API
    Serve,
    /// Consume transcode jobs from a Redis queue
    Worker {
        #[arg(default_value = DEFAULT_QUEUE)]
        queue: String,
    },
    /// Apply database migrations
    Migrate,
    /// Create the staff account from DJANGO_SUPERUSER_*
    CreateSuperuser,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_state(config: AppConfig) -> Result<AppState> {
    let db = bootstrap::wait_for_db(&config).await?;
    let redis = RedisService::new(&config.redis_url)
        .await
        .context("Redis is not reachable")?;
    let cache = RedisService::new(&config.cache_url)
        .await
        .context("Redis cache is not reachable")?;
    Ok(AppState::new(config, db, redis, cache))
}

async fn serve(state: AppState) -> Result<()> {
    bootstrap::run(&state).await?;

    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Could not bind {}", addr))?;
    info!("🚀 Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(common::shutdown::shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    init_tracing(config.debug);
    common::error::expose_internal_errors(config.debug);

    match cli.command {
        Command::Serve => {
            info!("Starting server...");
            serve(build_state(config).await?).await
        }
        Command::Worker { queue } => {
            let mut state = build_state(config).await?;
            state.queue = JobQueue::new(state.redis.clone(), &queue);
            workers::transcoder::start_transcoder_worker(state).await;
            Ok(())
        }
        Command::Migrate => {
            let db = bootstrap::wait_for_db(&config).await?;
            infrastructure::db::pool::run_migrations(&db).await?;
            Ok(())
        }
        Command::CreateSuperuser => {
            let state = build_state(config).await?;
            bootstrap::create_superuser(&state).await
        }
    }
}
