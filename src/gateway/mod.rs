//! Read-through image gateway.
//!
//! # Data Flow
//! ```text
//! lookup(key)
//!     → circuit open?          → ServiceUnavailable (nothing else touched)
//!     → negative entry?        → NotFound
//!     → positive entry?        → bytes + sniffed content type
//!     → limiter permit         (waits while N fetches run)
//!     → origin fetch (with retries)
//!         Ok                   → breaker success, write positive entry
//!         NotFound             → write negative entry
//!         ExhaustedRetries     → breaker failure, Upstream
//!         Terminal             → Upstream (breaker untouched)
//! ```
//!
//! # Design Decisions
//! - The gateway owns all shared state; handlers get it through `Arc<Gateway>`
//! - Cache store failures degrade to a miss, never to an error
//! - No request coalescing: concurrent misses for one key each reach the origin
//! - Dropping a lookup mid-flight releases its permit and skips the bookkeeping

pub mod content;
pub mod key;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::cache::{CacheKeys, CacheStore, MemoryStore, RedisStore, StoreError};
use crate::config::GatewayConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::origin::fetcher::OriginSetupError;
use crate::origin::{CardImage, FetchError, ImageSource, RetryingOriginFetcher};
use crate::resilience::{CircuitBreaker, ConcurrencyLimiter};

pub use content::sniff_content_type;
pub use key::{InvalidKey, LookupKey};

/// What a lookup returns to its caller.
pub type ImageResult = Result<CardImage, LookupError>;

/// Caller-facing lookup failures. Carries no retry counts or timings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("invalid key: {0}")]
    InvalidKey(#[from] InvalidKey),

    #[error("card image not found")]
    NotFound,

    #[error("image origin temporarily unavailable")]
    ServiceUnavailable,

    #[error("image origin request failed")]
    Upstream,
}

/// The gateway could not be assembled from configuration.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cache store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("origin setup failed: {0}")]
    Origin(#[from] OriginSetupError),
}

/// Snapshot for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayHealth {
    pub circuit_open: bool,
    pub origin_inflight: usize,
    pub origin_capacity: usize,
    pub store: &'static str,
}

/// Cache-fronted access to the origin.
pub struct Gateway {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn ImageSource>,
    keys: CacheKeys,
    limiter: ConcurrencyLimiter,
    breaker: CircuitBreaker,
    positive_ttl: Duration,
    negative_ttl: Duration,
}

impl Gateway {
    /// Assemble a gateway from explicit collaborators.
    pub fn new(store: Arc<dyn CacheStore>, origin: Arc<dyn ImageSource>, config: &GatewayConfig) -> Self {
        Self {
            store,
            origin,
            keys: CacheKeys::from_config(&config.cache),
            limiter: ConcurrencyLimiter::new(config.concurrency.limit),
            breaker: CircuitBreaker::from_config(&config.circuit_breaker),
            positive_ttl: config.cache.positive_ttl(),
            negative_ttl: config.cache.negative_ttl(),
        }
    }

    /// Build the production gateway: Redis (or in-process) store plus the HTTP origin fetcher.
    ///
    /// The in-process store gets a background purger that stops when `shutdown` fires.
    pub fn from_config(config: &GatewayConfig, shutdown: &Shutdown) -> Result<Self, GatewayError> {
        let store: Arc<dyn CacheStore> = if config.cache.redis_url.trim().is_empty() {
            tracing::warn!("No Redis URL configured, using in-process cache");
            let memory = MemoryStore::new();
            memory.spawn_purger(config.cache.purge_interval(), shutdown.clone());
            Arc::new(memory)
        } else {
            Arc::new(RedisStore::new(&config.cache.redis_url, config.cache.op_timeout())?)
        };
        let origin = Arc::new(RetryingOriginFetcher::new(&config.origin, &config.retries)?);

        tracing::info!(
            store = store.name(),
            origin = %config.origin.base_url,
            concurrency = config.concurrency.limit,
            max_attempts = config.retries.max_attempts,
            "Gateway initialized"
        );
        Ok(Self::new(store, origin, config))
    }

    /// Serve `raw_key` from cache, or fetch it from the origin and cache the result.
    pub async fn lookup(&self, raw_key: &str) -> ImageResult {
        let key = LookupKey::parse(raw_key)?;

        if self.breaker.is_open(Instant::now()) {
            tracing::debug!(key = %key, "Circuit open, failing fast");
            metrics::record_lookup("origin", "circuit_open");
            return Err(LookupError::ServiceUnavailable);
        }

        if self.negative_hit(&key).await {
            metrics::record_lookup("cache", "not_found");
            return Err(LookupError::NotFound);
        }

        if let Some(image) = self.positive_hit(&key).await {
            metrics::record_lookup("cache", "hit");
            return Ok(image);
        }
        metrics::record_lookup("cache", "miss");

        let result = {
            let _permit = self.limiter.acquire().await.map_err(|_| LookupError::ServiceUnavailable)?;

            // The circuit may have opened while this lookup was queued.
            if self.breaker.is_open(Instant::now()) {
                metrics::record_lookup("origin", "circuit_open");
                return Err(LookupError::ServiceUnavailable);
            }

            let started = Instant::now();
            let result = self.origin.fetch(key.as_str()).await;
            metrics::record_origin_latency(started.elapsed());
            result
        };

        match result {
            Ok(image) => {
                self.breaker.record_success(Instant::now());
                tracing::info!(key = %key, bytes = image.bytes.len(), content_type = %image.content_type, "Fetched image from origin");
                metrics::record_lookup("origin", "success");
                self.write(&self.keys.positive(key.as_str()), &image.bytes, self.positive_ttl)
                    .await;
                Ok(image)
            }
            Err(FetchError::NotFound) => {
                tracing::info!(key = %key, "Origin reports key absent");
                metrics::record_lookup("origin", "not_found");
                self.write(&self.keys.negative(key.as_str()), b"1", self.negative_ttl)
                    .await;
                Err(LookupError::NotFound)
            }
            Err(FetchError::Terminal { reason }) => {
                tracing::warn!(key = %key, reason = %reason, "Origin rejected request");
                metrics::record_lookup("origin", "error");
                Err(LookupError::Upstream)
            }
            Err(FetchError::ExhaustedRetries { attempts, last_reason }) => {
                let state = self.breaker.record_failure(Instant::now());
                tracing::error!(key = %key, attempts, reason = %last_reason, circuit = ?state, "Origin fetch exhausted retries");
                metrics::record_lookup("origin", "error");
                Err(LookupError::Upstream)
            }
        }
    }

    async fn negative_hit(&self, key: &LookupKey) -> bool {
        match self.store.exists(&self.keys.negative(key.as_str())).await {
            Ok(found) => found,
            Err(e) => {
                self.store_failed("exists", &e);
                false
            }
        }
    }

    async fn positive_hit(&self, key: &LookupKey) -> Option<CardImage> {
        match self.store.get(&self.keys.positive(key.as_str())).await {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                let content_type = sniff_content_type(&bytes);
                tracing::debug!(key = %key, bytes = bytes.len(), "Cache hit");
                Some(CardImage::new(Bytes::from(bytes), content_type))
            }
            Ok(_) => None,
            Err(e) => {
                self.store_failed("get", &e);
                None
            }
        }
    }

    async fn write(&self, store_key: &str, value: &[u8], ttl: Duration) {
        if let Err(e) = self.store.set(store_key, value, ttl).await {
            self.store_failed("set", &e);
        }
    }

    fn store_failed(&self, op: &'static str, error: &StoreError) {
        tracing::warn!(op, store = self.store.name(), error = %error, "Cache store failed, continuing without cache");
        metrics::record_store_error(op);
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn health(&self) -> GatewayHealth {
        GatewayHealth {
            circuit_open: self.breaker.is_open(Instant::now()),
            origin_inflight: self.limiter.in_flight(),
            origin_capacity: self.limiter.capacity(),
            store: self.store.name(),
        }
    }

    /// Refuse new origin fetches; queued lookups fail with `ServiceUnavailable`.
    pub fn close(&self) {
        self.limiter.close();
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("store", &self.store.name())
            .field("keys", &self.keys)
            .field("limiter", &self.limiter)
            .field("positive_ttl", &self.positive_ttl)
            .field("negative_ttl", &self.negative_ttl)
            .finish()
    }
}
