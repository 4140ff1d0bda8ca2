use redis::{aio::ConnectionManager, Client};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// One shared, self-reconnecting connection per client. Clones of the
/// service hand out clones of the same multiplexed connection.
#[derive(Clone)]
pub struct RedisService {
    client: Client,
    conn: Arc<OnceCell<ConnectionManager>>,
}

impl RedisService {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;
        let manager = ConnectionManager::new(client.clone()).await?;

        info!("✅ Connected to Redis at {}", client.get_connection_info().addr);
        Ok(Self {
            client,
            conn: Arc::new(OnceCell::from(manager)),
        })
    }

    /// Client that connects on first use.
    pub fn lazy(connection_string: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: Client::open(connection_string)?,
            conn: Arc::new(OnceCell::new()),
        })
    }

    pub async fn get_conn(&self) -> Result<ConnectionManager, redis::RedisError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_connection() {
        let redis = RedisService::lazy("redis://127.0.0.1:1/0").unwrap();
        let clone = redis.clone();
        assert!(Arc::ptr_eq(&redis.conn, &clone.conn));
        assert!(!redis.conn.initialized());
    }

    #[tokio::test]
    async fn failed_connect_leaves_client_unconnected() {
        let redis = RedisService::lazy("redis://127.0.0.1:1/0").unwrap();
        assert!(redis.get_conn().await.is_err());
        assert!(!redis.conn.initialized());
    }
}
