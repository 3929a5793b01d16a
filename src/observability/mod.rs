//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gateway / origin / resilience / cache
//!     → logging.rs (structured tracing events, request id in the HTTP span)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape listener (separate from the public router)
//! ```
//!
//! # Design Decisions
//! - Metric calls go through the `metrics` facade; without an installed recorder they are no-ops
//! - `RUST_LOG` overrides the configured level

pub mod logging;
pub mod metrics;
