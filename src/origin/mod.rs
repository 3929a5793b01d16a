//! Origin (card metadata + image provider) subsystem.
//!
//! # Data Flow
//! ```text
//! fetch(key)
//!     → fetcher.rs: resolve   GET {base_url}/{key}  → types.rs picks an image locator
//!     → fetcher.rs: download  GET {locator}         → bytes + content-type
//!     → each attempt yields a FetchOutcome; retries.rs decides whether to go again
//! ```
//!
//! # Design Decisions
//! - Classification (not found / retryable / terminal) happens here and only here
//! - Callers see a closed set of errors, never raw status codes

pub mod fetcher;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use fetcher::RetryingOriginFetcher;
pub use types::{CardDocument, CardFace, ImageUris};

/// Content type assumed when the origin sends none.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Image bytes with their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardImage {
    pub bytes: Bytes,
    pub content_type: String,
}

impl CardImage {
    pub fn new(bytes: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// Result of one origin attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(CardImage),
    NotFound,
    Retryable { reason: String },
    Terminal { reason: String },
}

impl FetchOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::NotFound => "not_found",
            FetchOutcome::Retryable { .. } => "retryable",
            FetchOutcome::Terminal { .. } => "terminal",
        }
    }
}

/// Final failure of a fetch after the retry policy ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The origin confirmed the resource (or its image) does not exist.
    #[error("resource not found at origin")]
    NotFound,

    /// The origin refused the request in a way retrying cannot fix.
    #[error("origin rejected request: {reason}")]
    Terminal { reason: String },

    /// Every attempt failed with a retryable error.
    #[error("origin unavailable after {attempts} attempts: {last_reason}")]
    ExhaustedRetries { attempts: u32, last_reason: String },
}

/// Anything that can produce card images for a key.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<CardImage, FetchError>;
}
