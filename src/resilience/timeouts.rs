//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap each origin phase (resolve, download) with its own deadline
//! - Cancel the wrapped future cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors and name the phase

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The origin phase a deadline applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Download,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Resolve => f.write_str("resolve"),
            Phase::Download => f.write_str("download"),
        }
    }
}

/// A phase did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{phase} timed out after {}ms", .limit.as_millis())]
pub struct PhaseTimeout {
    pub phase: Phase,
    pub limit: Duration,
}

/// Run `fut`, giving up after `limit`.
pub async fn with_deadline<F, T>(phase: Phase, limit: Duration, fut: F) -> Result<T, PhaseTimeout>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| PhaseTimeout { phase, limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let result = with_deadline(Phase::Resolve, Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.phase, Phase::Resolve);
        assert_eq!(err.to_string(), "resolve timed out after 50ms");
    }

    #[tokio::test]
    async fn test_deadline_passes_value_through() {
        let value = with_deadline(Phase::Download, Duration::from_secs(1), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }
}
