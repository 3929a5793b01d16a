//! Origin concurrency limiter.
//!
//! # Responsibilities
//! - Cap simultaneous origin fetches at a configured number of permits
//! - Queue excess callers in arrival order
//! - Return the permit on every exit path (success, error, cancellation)
//!
//! # Design Decisions
//! - Tokio's semaphore is FIFO-fair, so queued lookups cannot starve
//! - Permits are RAII guards; dropping the guard (or the future holding it) releases
//! - Independent of the circuit breaker

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// The limiter was closed (process shutting down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("concurrency limiter closed")]
pub struct LimiterClosed;

/// A counting permit pool bounding concurrent origin fetches.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free permit.
    pub async fn acquire(&self) -> Result<OriginPermit, LimiterClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterClosed)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        metrics::set_origin_inflight(now);

        tracing::trace!(
            in_flight = now,
            available_permits = self.semaphore.available_permits(),
            "Origin permit acquired"
        );

        Ok(OriginPermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Stop handing out permits; queued and future callers get `LimiterClosed`.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Fetches currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at once since construction.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A held origin slot. Released when dropped.
#[derive(Debug)]
pub struct OriginPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for OriginPermit {
    fn drop(&mut self) {
        let now = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_origin_inflight(now);
    }
}
