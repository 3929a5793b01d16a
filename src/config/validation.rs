//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (TTLs, timeouts, thresholds > 0)
//! - Check that the two cache namespaces cannot collide
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("origin.base_url '{url}' is invalid: {reason}")]
    OriginUrl { url: String, reason: String },

    #[error("cache prefixes '{positive}' and '{negative}' overlap")]
    OverlappingPrefixes { positive: String, negative: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("cache.positive_ttl_secs", config.cache.positive_ttl_secs),
        ("cache.negative_ttl_secs", config.cache.negative_ttl_secs),
        ("cache.op_timeout_ms", config.cache.op_timeout_ms),
        ("cache.purge_interval_secs", config.cache.purge_interval_secs),
        ("origin.resolve_timeout_ms", config.origin.resolve_timeout_ms),
        ("origin.download_timeout_ms", config.origin.download_timeout_ms),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("concurrency.limit", config.concurrency.limit as u64),
        ("circuit_breaker.failure_threshold", u64::from(config.circuit_breaker.failure_threshold)),
        ("circuit_breaker.window_secs", config.circuit_breaker.window_secs),
        ("circuit_breaker.open_secs", config.circuit_breaker.open_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match Url::parse(&config.origin.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            if url.cannot_be_a_base() {
                errors.push(ValidationError::OriginUrl {
                    url: config.origin.base_url.clone(),
                    reason: "cannot be used as a base".to_string(),
                });
            }
        }
        Ok(url) => errors.push(ValidationError::OriginUrl {
            url: config.origin.base_url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::OriginUrl {
            url: config.origin.base_url.clone(),
            reason: e.to_string(),
        }),
    }

    let pos = &config.cache.positive_prefix;
    let neg = &config.cache.negative_prefix;
    if pos.is_empty() {
        errors.push(ValidationError::Empty { field: "cache.positive_prefix" });
    }
    if neg.is_empty() {
        errors.push(ValidationError::Empty { field: "cache.negative_prefix" });
    }
    // One prefix extending the other lets "<short><x>" equal "<long><y>".
    if !pos.is_empty() && !neg.is_empty() && (pos.starts_with(neg.as_str()) || neg.starts_with(pos.as_str())) {
        errors.push(ValidationError::OverlappingPrefixes {
            positive: pos.clone(),
            negative: neg.clone(),
        });
    }

    if config.origin.resolve_timeout_ms > config.origin.download_timeout_ms {
        tracing::warn!(
            resolve_timeout_ms = config.origin.resolve_timeout_ms,
            download_timeout_ms = config.origin.download_timeout_ms,
            "Resolve timeout exceeds download timeout"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
