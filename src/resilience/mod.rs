//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Lookup that missed the cache:
//!     → circuit_breaker.rs (fail fast while open)
//!     → limiter.rs (wait for one of N origin permits)
//!     → retries.rs (attempt loop, backoff.rs between attempts)
//!     → timeouts.rs (per-phase deadline inside each attempt)
//!     → circuit_breaker.rs (record success / failure)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every origin call has a deadline
//! - Only outcomes tagged retryable are retried
//! - Circuit breaker and concurrency limiter are orthogonal
//! - Shared state (window, permits) lives in one owner, the Gateway

pub mod backoff;
pub mod circuit_breaker;
pub mod limiter;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitState, FailureWindow};
pub use limiter::{ConcurrencyLimiter, LimiterClosed, OriginPermit};
pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, Phase, PhaseTimeout};
