//! Cache store subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway
//!     → keys.rs (namespace the lookup key: positive / negative)
//!     → CacheStore::{exists, get, set}
//!         → redis.rs  (shared lazily-connected Redis client)
//!         → memory.rs (in-process map, tests and single-node runs)
//! ```
//!
//! # Design Decisions
//! - Stores never delete; entries die by TTL
//! - Every failure surfaces as `StoreError`, which the gateway treats as a miss
//! - Values are opaque bytes; the gateway decides what they mean

pub mod keys;
pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use keys::CacheKeys;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors raised by a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing service could not be reached or refused the command.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not finish within the configured deadline.
    #[error("cache store operation timed out after {0:?}")]
    Timeout(Duration),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value contract the gateway needs from its cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Stored bytes for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()>;

    /// Whether a live entry exists for `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Short name used in logs and the health endpoint.
    fn name(&self) -> &'static str;
}
