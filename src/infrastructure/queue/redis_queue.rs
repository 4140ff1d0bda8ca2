//! Job queue on plain Redis lists.
//!
//! Producers `LPUSH` JSON payloads onto `queue:<name>`. The worker `BLMOVE`s
//! them from the other end onto `queue:<name>:processing`, so jobs are consumed
//! in FIFO order and a job stays in Redis until the worker acks it. Payloads
//! left on the processing list by a killed worker are put back at startup.
//! Jobs that exhaust their retries are parked on `queue:<name>:failed`.

use redis::AsyncCommands;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::infrastructure::redis::client::RedisService;

pub const DEFAULT_QUEUE: &str = "default";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Entry stored on the failed list.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct FailedEntry {
    pub payload: String,
    pub error: String,
    #[serde(with = "time::serde::rfc3339")]
    pub failed_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct JobQueue {
    redis: RedisService,
    name: String,
}

impl JobQueue {
    pub fn new(redis: RedisService, name: &str) -> Self {
        Self {
            redis,
            name: name.to_string(),
        }
    }

    pub fn key(&self) -> String {
        format!("queue:{}", self.name)
    }

    pub fn failed_key(&self) -> String {
        format!("queue:{}:failed", self.name)
    }

    pub fn processing_key(&self) -> String {
        format!("queue:{}:processing", self.name)
    }

    pub async fn enqueue<T: Serialize>(&self, job: &T) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.redis.get_conn().await?;
        let _: i64 = conn.lpush(self.key(), &payload).await?;
        debug!("Enqueued job on '{}': {}", self.name, payload);
        Ok(())
    }

    /// Waits up to `timeout_secs` for the next raw payload and claims it on
    /// the processing list. Call [`JobQueue::ack`] once it is handled.
    pub async fn dequeue_raw(&self, timeout_secs: f64) -> QueueResult<Option<String>> {
        let mut conn = self.redis.get_conn().await?;
        let payload: Option<String> = redis::cmd("BLMOVE")
            .arg(self.key())
            .arg(self.processing_key())
            .arg("RIGHT")
            .arg("LEFT")
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        Ok(payload)
    }

    /// Drops a handled payload from the processing list.
    pub async fn ack(&self, payload: &str) -> QueueResult<()> {
        let mut conn = self.redis.get_conn().await?;
        let _: i64 = conn.lrem(self.processing_key(), 1, payload).await?;
        Ok(())
    }

    /// Returns an unfinished payload to the consuming end of the queue.
    pub async fn release(&self, payload: &str) -> QueueResult<()> {
        let mut conn = self.redis.get_conn().await?;
        let _: () = redis::pipe()
            .atomic()
            .lrem(self.processing_key(), 1, payload)
            .ignore()
            .rpush(self.key(), payload)
            .ignore()
            .query_async(&mut conn)
            .await?;
        debug!("Released job back to '{}'", self.name);
        Ok(())
    }

    /// Moves everything left on the processing list back onto the queue,
    /// oldest first. Returns how many payloads were recovered.
    pub async fn recover_in_flight(&self) -> QueueResult<usize> {
        let mut conn = self.redis.get_conn().await?;
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(self.processing_key())
                .arg(self.key())
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            warn!("Recovered {} unfinished job(s) on '{}'", recovered, self.name);
        }
        Ok(recovered)
    }

    pub fn decode<T: DeserializeOwned>(payload: &str) -> QueueResult<T> {
        Ok(serde_json::from_str(payload)?)
    }

    pub async fn push_failed(&self, payload: &str, error: &str) -> QueueResult<()> {
        let entry = FailedEntry {
            payload: payload.to_string(),
            error: error.to_string(),
            failed_at: OffsetDateTime::now_utc(),
        };
        let mut conn = self.redis.get_conn().await?;
        let _: i64 = conn.lpush(self.failed_key(), serde_json::to_string(&entry)?).await?;
        warn!("Moved job to '{}': {}", self.failed_key(), error);
        Ok(())
    }

    pub async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.redis.get_conn().await?;
        Ok(conn.llen(self.key()).await?)
    }

    pub async fn log_depth(&self) {
        match self.len().await {
            Ok(n) => info!("Queue '{}' has {} pending job(s)", self.name, n),
            Err(e) => warn!("Could not read depth of queue '{}': {}", self.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_queue_name() {
        let redis = RedisService::lazy("redis://127.0.0.1:1/0").unwrap();
        let queue = JobQueue::new(redis, DEFAULT_QUEUE);
        assert_eq!(queue.key(), "queue:default");
        assert_eq!(queue.failed_key(), "queue:default:failed");
        assert_eq!(queue.processing_key(), "queue:default:processing");
    }

    #[test]
    fn decode_rejects_garbage() {
        let result: QueueResult<serde_json::Value> = JobQueue::decode("{not json");
        assert!(matches!(result, Err(QueueError::Serialization(_))));
    }
}
