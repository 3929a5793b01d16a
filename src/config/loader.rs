//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the process environment.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto a configuration.
///
/// Durations the operators historically set as fractional seconds
/// (`IMAGE_FETCH_TIMEOUT=2.5`) are converted to milliseconds.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |var: &'static str| env(var).map(|v| (var, v.trim().to_string()));

    if let Some((_, v)) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some((_, v)) = lookup("REDIS_URL") {
        config.cache.redis_url = v;
    }
    if let Some(pair) = lookup("IMAGE_CACHE_TTL") {
        config.cache.positive_ttl_secs = parse_int(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_NEG_CACHE_TTL") {
        config.cache.negative_ttl_secs = parse_int(pair)?;
    }
    if let Some(pair) = lookup("CACHE_OP_TIMEOUT_MS") {
        config.cache.op_timeout_ms = parse_int(pair)?;
    }
    if let Some(pair) = lookup("CACHE_PURGE_INTERVAL") {
        config.cache.purge_interval_secs = parse_int(pair)?;
    }
    if let Some((_, v)) = lookup("ORIGIN_BASE_URL") {
        config.origin.base_url = v;
    }
    if let Some(pair) = lookup("IMAGE_FETCH_TIMEOUT") {
        config.origin.resolve_timeout_ms = parse_secs_as_ms(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_DOWNLOAD_TIMEOUT") {
        config.origin.download_timeout_ms = parse_secs_as_ms(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_FETCH_RETRIES") {
        config.retries.max_attempts = parse_int(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_RETRY_BACKOFF_BASE") {
        config.retries.backoff_base_ms = parse_secs_as_ms(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_CONCURRENCY_LIMIT") {
        config.concurrency.limit = parse_int(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_CIRCUIT_THRESHOLD") {
        config.circuit_breaker.failure_threshold = parse_int(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_CIRCUIT_WINDOW_SECONDS") {
        config.circuit_breaker.window_secs = parse_int(pair)?;
    }
    if let Some(pair) = lookup("IMAGE_CIRCUIT_OPEN_SECONDS") {
        config.circuit_breaker.open_secs = parse_int(pair)?;
    }
    if let Some((_, v)) = lookup("LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(pair) = lookup("METRICS_ENABLED") {
        config.observability.metrics_enabled = parse_bool(pair)?;
    }
    if let Some((_, v)) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_address = v;
    }

    Ok(())
}

fn parse_int<T>((var, value): (&'static str, String)) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Env {
        var,
        reason: e.to_string(),
        value,
    })
}

fn parse_secs_as_ms((var, value): (&'static str, String)) -> Result<u64, ConfigError> {
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok((secs * 1000.0).round() as u64),
        Ok(_) => Err(ConfigError::Env {
            var,
            value,
            reason: "must be a non-negative number of seconds".to_string(),
        }),
        Err(e) => Err(ConfigError::Env {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool((var, value): (&'static str, String)) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}
