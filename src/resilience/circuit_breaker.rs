//! Circuit breaker for origin protection.
//!
//! # States
//! - Closed: normal operation, lookups may reach the origin
//! - Open: origin assumed down, lookups fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures inside the sliding window reach the threshold
//! Open → Closed: `open_for` elapses (observed by `is_open`), or any success is recorded
//! ```
//!
//! # Design Decisions
//! - One breaker for the single origin (not per key)
//! - No half-open state: once `open_until` passes, calls flow normally again
//! - A success wipes the window instead of decaying it
//! - Callers pass `now`, so transitions are testable without sleeping

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

/// Failure timestamps inside a sliding time window.
///
/// Only the newest `capacity` entries are kept: the breaker only asks whether
/// the count reached the threshold, so older entries can never matter.
#[derive(Debug)]
pub struct FailureWindow {
    window: Duration,
    capacity: usize,
    failures: VecDeque<Instant>,
}

impl FailureWindow {
    pub fn new(window: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window,
            capacity,
            failures: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a failure and return how many failures remain in the window.
    pub fn record(&mut self, now: Instant) -> usize {
        // Keep the sequence ordered even if callers race on `now`.
        let ts = match self.failures.back() {
            Some(&last) if last > now => last,
            _ => now,
        };
        self.failures.push_back(ts);
        if self.failures.len() > self.capacity {
            self.failures.pop_front();
        }
        self.evict(now);
        self.failures.len()
    }

    /// Drop entries older than the window.
    pub fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.failures.clear();
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
struct BreakerState {
    window: FailureWindow,
    /// `None` means "in the past": the circuit is closed.
    open_until: Option<Instant>,
}

/// Sliding-window circuit breaker shared by all lookups.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    failure_threshold: usize,
    open_for: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, window: Duration, open_for: Duration) -> Self {
        let failure_threshold = (failure_threshold as usize).max(1);
        Self {
            state: Mutex::new(BreakerState {
                window: FailureWindow::new(window, failure_threshold),
                open_until: None,
            }),
            failure_threshold,
            open_for,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_secs(config.window_secs),
            Duration::from_secs(config.open_secs),
        )
    }

    // Every mutation completes before the guard drops, so a poisoned
    // lock still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while `now` is before the open deadline.
    ///
    /// The first call past the deadline closes the circuit and clears the gauge.
    pub fn is_open(&self, now: Instant) -> bool {
        let mut state = self.lock();
        match state.open_until {
            Some(until) if now < until => true,
            Some(_) => {
                state.open_until = None;
                drop(state);
                tracing::info!("Circuit open period elapsed, origin calls resume");
                metrics::set_circuit_open(false);
                false
            }
            None => false,
        }
    }

    pub fn state(&self, now: Instant) -> CircuitState {
        if self.is_open(now) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Deadline of the current open period, if any is pending.
    pub fn open_until(&self) -> Option<Instant> {
        self.lock().open_until
    }

    pub fn failure_count(&self, now: Instant) -> usize {
        let mut state = self.lock();
        state.window.evict(now);
        state.window.len()
    }

    /// Record an origin failure; opens (or extends) the circuit at the threshold.
    pub fn record_failure(&self, now: Instant) -> CircuitState {
        let mut state = self.lock();
        let count = state.window.record(now);

        if count >= self.failure_threshold {
            let was_open = matches!(state.open_until, Some(until) if now < until);
            let until = now + self.open_for;
            state.open_until = Some(match state.open_until {
                Some(existing) if existing > until => existing,
                _ => until,
            });
            drop(state);

            if !was_open {
                tracing::warn!(
                    failures = count,
                    open_for = ?self.open_for,
                    "Circuit opened, origin calls suspended"
                );
            }
            metrics::set_circuit_open(true);
            CircuitState::Open
        } else {
            tracing::debug!(failures = count, threshold = self.failure_threshold, "Origin failure recorded");
            CircuitState::Closed
        }
    }

    /// Record an origin success: clears the window and closes the circuit.
    pub fn record_success(&self, now: Instant) {
        let mut state = self.lock();
        let had_state = state.open_until.is_some() || !state.window.is_empty();
        let was_open = matches!(state.open_until, Some(until) if now < until);
        state.window.clear();
        state.open_until = None;
        drop(state);

        if was_open {
            tracing::info!("Circuit closed after origin success");
        } else if had_state {
            tracing::debug!("Failure window reset after origin success");
        }
        metrics::set_circuit_open(false);
    }
}
