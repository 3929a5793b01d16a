//! Two-phase origin retrieval with classified retries.
//!
//! # Responsibilities
//! - Resolve: fetch card metadata and pick an image locator
//! - Download: fetch the image bytes and their content type
//! - Classify every failure as not found, retryable or terminal
//!
//! # Design Decisions
//! - 404 in either phase means "absent" and is never retried
//! - 5xx, connect errors and timeouts are retryable
//! - Any other non-success status is terminal
//! - Each phase has its own deadline (resolve is small, download is large)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::{OriginConfig, RetryConfig};
use crate::origin::types::CardDocument;
use crate::origin::{CardImage, FetchError, FetchOutcome, ImageSource, DEFAULT_CONTENT_TYPE};
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::{with_deadline, Phase};

/// The fetcher could not be constructed.
#[derive(Debug, Error)]
pub enum OriginSetupError {
    #[error("invalid origin base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Fetches card images from the origin, retrying transient failures.
#[derive(Debug, Clone)]
pub struct RetryingOriginFetcher {
    client: reqwest::Client,
    base_url: Url,
    resolve_timeout: Duration,
    download_timeout: Duration,
    policy: RetryPolicy,
}

impl RetryingOriginFetcher {
    pub fn new(origin: &OriginConfig, retries: &RetryConfig) -> Result<Self, OriginSetupError> {
        let base_url = Url::parse(&origin.base_url).map_err(|e| OriginSetupError::BaseUrl {
            url: origin.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(OriginSetupError::BaseUrl {
                url: origin.base_url.clone(),
                reason: "cannot be used as a base".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .user_agent(origin.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url,
            resolve_timeout: origin.resolve_timeout(),
            download_timeout: origin.download_timeout(),
            policy: RetryPolicy::from_config(retries),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Metadata URL for `key`; the key is percent-encoded as one path segment.
    pub fn metadata_url(&self, key: &str) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut().ok()?.pop_if_empty().push(key);
        Some(url)
    }

    /// One resolve + download attempt.
    pub async fn attempt(&self, key: &str) -> FetchOutcome {
        let locator = match self.resolve(key).await {
            Ok(locator) => locator,
            Err(outcome) => return outcome,
        };
        self.download(&locator).await
    }

    async fn resolve(&self, key: &str) -> Result<Url, FetchOutcome> {
        let url = self.metadata_url(key).ok_or_else(|| FetchOutcome::Terminal {
            reason: "origin base URL cannot carry a key".to_string(),
        })?;

        let fetch = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match with_deadline(Phase::Resolve, self.resolve_timeout, fetch).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(network_failure(Phase::Resolve, &e)),
            Err(timeout) => {
                return Err(FetchOutcome::Retryable {
                    reason: timeout.to_string(),
                })
            }
        };

        if let Some(outcome) = classify_status(Phase::Resolve, status) {
            return Err(outcome);
        }

        // A 2xx that is not a card document (e.g. a maintenance page) is origin trouble.
        let document: CardDocument = serde_json::from_slice(&body).map_err(|e| FetchOutcome::Retryable {
            reason: format!("resolve returned an unreadable document: {e}"),
        })?;

        let Some(locator) = document.image_locator() else {
            tracing::debug!(key = %key, "Card has no image locator");
            return Err(FetchOutcome::NotFound);
        };

        Url::parse(locator).map_err(|e| FetchOutcome::Terminal {
            reason: format!("resolve returned an invalid image locator: {e}"),
        })
    }

    async fn download(&self, locator: &Url) -> FetchOutcome {
        let fetch = async {
            let response = self.client.get(locator.clone()).send().await?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, content_type, body))
        };

        let (status, content_type, body) =
            match with_deadline(Phase::Download, self.download_timeout, fetch).await {
                Ok(Ok(parts)) => parts,
                Ok(Err(e)) => return network_failure(Phase::Download, &e),
                Err(timeout) => {
                    return FetchOutcome::Retryable {
                        reason: timeout.to_string(),
                    }
                }
            };

        if let Some(outcome) = classify_status(Phase::Download, status) {
            return outcome;
        }

        FetchOutcome::Success(CardImage::new(body, content_type))
    }
}

#[async_trait]
impl ImageSource for RetryingOriginFetcher {
    async fn fetch(&self, key: &str) -> Result<CardImage, FetchError> {
        self.policy.run(key, |_| self.attempt(key)).await
    }
}

/// Map a non-success status to an outcome; `None` for 2xx.
pub fn classify_status(phase: Phase, status: StatusCode) -> Option<FetchOutcome> {
    if status.is_success() {
        None
    } else if status == StatusCode::NOT_FOUND {
        Some(FetchOutcome::NotFound)
    } else if status.is_server_error() {
        Some(FetchOutcome::Retryable {
            reason: format!("{phase} returned {status}"),
        })
    } else {
        Some(FetchOutcome::Terminal {
            reason: format!("{phase} returned {status}"),
        })
    }
}

fn network_failure(phase: Phase, error: &reqwest::Error) -> FetchOutcome {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_body() || error.is_decode() {
        "body read failed"
    } else {
        "request failed"
    };
    FetchOutcome::Retryable {
        reason: format!("{phase} {kind}"),
    }
}
