//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the image gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Cache store settings (positive and negative namespaces).
    pub cache: CacheConfig,

    /// Origin endpoints and per-phase timeouts.
    pub origin: OriginConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Origin concurrency limit.
    pub concurrency: ConcurrencyConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis URL. Empty selects the in-process store.
    pub redis_url: String,

    /// Lifetime of cached image bytes, in seconds.
    pub positive_ttl_secs: u64,

    /// Lifetime of "confirmed absent" markers, in seconds.
    pub negative_ttl_secs: u64,

    /// Deadline for a single store operation in milliseconds.
    pub op_timeout_ms: u64,

    /// How often the in-process store drops expired entries, in seconds.
    pub purge_interval_secs: u64,

    /// Key prefix for cached images.
    pub positive_prefix: String,

    /// Key prefix for not-found markers.
    pub negative_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/0".to_string(),
            positive_ttl_secs: 86_400,
            negative_ttl_secs: 300,
            op_timeout_ms: 1_000,
            purge_interval_secs: 60,
            positive_prefix: "cardimg:".to_string(),
            negative_prefix: "cardimgneg:".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn positive_ttl(&self) -> Duration {
        Duration::from_secs(self.positive_ttl_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

/// Origin (card metadata + image provider) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Metadata endpoint; the lookup key is appended as a path segment.
    pub base_url: String,

    /// Timeout for the metadata (resolve) call in milliseconds.
    pub resolve_timeout_ms: u64,

    /// Timeout for the image download in milliseconds.
    pub download_timeout_ms: u64,

    /// User-Agent sent to the origin.
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.scryfall.com/cards/".to_string(),
            resolve_timeout_ms: 10_000,
            download_timeout_ms: 15_000,
            user_agent: concat!("card-image-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl OriginConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of origin attempts per lookup (first try included).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 200,
            max_delay_ms: 30_000,
        }
    }
}

/// Origin concurrency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum simultaneous origin fetches.
    pub limit: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { limit: 25 }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures inside the window needed to open the circuit.
    pub failure_threshold: u32,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// How long the circuit stays open once tripped, in seconds.
    pub open_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 20,
            window_secs: 60,
            open_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
