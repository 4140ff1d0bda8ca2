use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::mail::smtp::EmailService;
use crate::infrastructure::queue::redis_queue::{JobQueue, DEFAULT_QUEUE};
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::media::MediaStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    /// Broker connection: job queue and token blacklist.
    pub redis: RedisService,
    /// Cache connection (`REDIS_LOCATION`).
    pub cache: RedisService,
    pub mailer: EmailService,
    pub queue: JobQueue,
    pub media: MediaStorage,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, redis: RedisService, cache: RedisService) -> Self {
        let mailer = EmailService::new(config.email.clone());
        let queue = JobQueue::new(redis.clone(), DEFAULT_QUEUE);
        let media = MediaStorage::new(config.media_root.clone());

        Self {
            config,
            db,
            redis,
            cache,
            mailer,
            queue,
            media,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State whose Postgres pool and Redis clients never connect until used.
    pub fn for_tests(config: AppConfig) -> Self {
        let db = crate::infrastructure::db::pool::connect_lazy(&config.database_url)
            .expect("valid test database url");
        Self::for_tests_with_pool(config, db)
    }

    /// Real database, lazily connected (and in tests unreachable) Redis.
    pub fn for_tests_with_pool(config: AppConfig, db: DbPool) -> Self {
        let redis = RedisService::lazy(&config.redis_url).expect("valid test redis url");
        let cache = RedisService::lazy(&config.cache_url).expect("valid test redis url");
        Self::new(config, db, redis, cache)
    }
}
