//! Redis-backed cache store.
//!
//! # Responsibilities
//! - Hold one shared, auto-reconnecting connection for the whole process
//! - Connect lazily on first use, exactly once even under concurrent first calls
//! - Bound every command with a deadline so a stalled Redis cannot stall lookups

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::OnceCell;

use crate::cache::{CacheStore, StoreError, StoreResult};

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Cache store talking to a Redis server.
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    op_timeout: Duration,
}

impl RedisStore {
    /// Validate the URL; the connection itself is opened on first use.
    pub fn new(url: &str, op_timeout: Duration) -> StoreResult<Self> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            op_timeout,
        })
    }

    async fn connection(&self) -> StoreResult<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = self.bounded(ConnectionManager::new(self.client.clone())).await??;
                tracing::info!("Redis connection established");
                Ok::<_, StoreError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<F, T>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.connection.initialized())
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = self.bounded(conn.get(key)).await??;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        self.bounded(conn.set_ex::<_, _, ()>(key, value, seconds)).await??;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let found: bool = self.bounded(conn.exists(key)).await??;
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
