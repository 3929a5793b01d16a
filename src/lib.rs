//! Card image gateway library.
//!
//! A read-through cache in front of a slow, rate-limited image origin:
//! positive and negative caching, bounded origin concurrency, retries with
//! exponential backoff and a failure-window circuit breaker.

pub mod cache;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod origin;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use gateway::{Gateway, ImageResult, LookupError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
