//! External API gateway.
//!
//! A uniform retry/backoff HTTP client wrapper used by every sync operation
//! that talks to an upstream metadata service. Transient upstream statuses
//! (429 and 5xx) are retried with exponential backoff and jitter; retries are
//! applied to idempotent GETs only. Anything that survives the retry budget
//! is reported as an error and treated by callers as a soft fetch failure.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};

/// Upstream statuses considered transient and worth retrying.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Maximum retry attempts for a transient upstream error.
pub const MAX_RETRIES: usize = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network/transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Transient upstream status that survived the retry budget.
    #[error("transient upstream status {status} for {url}")]
    Transient { status: u16, url: String },

    /// Non-success, non-transient status (4xx other than 429, etc.).
    #[error("upstream status {status} for {url}")]
    Status { status: u16, url: String },

    /// Body was not the JSON shape the caller expected.
    #[error("malformed JSON from {url}: {message}")]
    Decode { url: String, message: String },
}

impl From<HttpError> for GatewayError {
    fn from(e: HttpError) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

impl GatewayError {
    fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient { .. })
    }
}

/// Build the backoff strategy shared by all gateway requests.
#[must_use]
pub fn default_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(INITIAL_BACKOFF_MS))
        .with_max_delay(Duration::from_millis(MAX_BACKOFF_MS))
        .with_max_times(MAX_RETRIES)
        .with_jitter()
}

/// Uniform HTTP client wrapper over an injected [`HttpTransport`].
#[derive(Clone)]
pub struct ApiGateway {
    transport: Arc<dyn HttpTransport>,
}

impl ApiGateway {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// GET a URL with transient-status retry, returning the raw response.
    async fn get_with_retry(&self, url: &str) -> Result<HttpResponse, GatewayError> {
        let fetch = || async {
            let resp = self.transport.send(HttpRequest::get(url)).await?;
            if TRANSIENT_STATUSES.contains(&resp.status) {
                return Err(GatewayError::Transient {
                    status: resp.status,
                    url: url.to_string(),
                });
            }
            Ok(resp)
        };

        fetch
            .retry(default_backoff())
            .when(GatewayError::is_transient)
            .notify(|err, dur| {
                tracing::debug!("transient upstream error, retrying in {:?}: {}", dur, err);
            })
            .await
    }

    /// GET a JSON document and deserialize it.
    ///
    /// Non-200 statuses and malformed bodies are errors; callers in the sync
    /// engine catch them as soft failures and continue.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GatewayError> {
        let resp = self.get_with_retry(url).await?;
        if resp.status != 200 {
            return Err(GatewayError::Status {
                status: resp.status,
                url: url.to_string(),
            });
        }
        serde_json::from_slice(&resp.body).map_err(|e| GatewayError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GET a JSON document, mapping 404 to `Ok(None)`.
    pub async fn get_json_opt<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, GatewayError> {
        match self.get_json(url).await {
            Ok(value) => Ok(Some(value)),
            Err(GatewayError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET a plain-text body (README raw-content fallback).
    pub async fn get_text(&self, url: &str) -> Result<String, GatewayError> {
        let resp = self.get_with_retry(url).await?;
        if resp.status != 200 {
            return Err(GatewayError::Status {
                status: resp.status,
                url: url.to_string(),
            });
        }
        String::from_utf8(resp.body).map_err(|e| GatewayError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Fire-and-forget POST used for upstream ping notifications.
    ///
    /// Errors are swallowed by design; pings are best-effort.
    pub async fn post_ping(&self, url: &str) {
        if let Err(e) = self.transport.send(HttpRequest::post(url)).await {
            tracing::debug!("ping to {} failed: {}", url, e);
        }
    }

    /// Fetch a paginated JSON collection endpoint.
    ///
    /// Pages start at 1. The loop stops on an empty page, a short page
    /// (`len < per_page`), or after `max_pages` pages, so every pagination
    /// loop terminates in bounded time even against a hostile upstream.
    pub async fn fetch_paginated<T, R>(
        &self,
        route_fn: R,
        per_page: usize,
        max_pages: u32,
    ) -> Result<Vec<T>, GatewayError>
    where
        T: DeserializeOwned,
        R: Fn(u32) -> String,
    {
        let mut items: Vec<T> = Vec::new();

        for page in 1..=max_pages {
            let url = route_fn(page);
            let batch: Vec<T> = self.get_json(&url).await?;
            let count = batch.len();
            items.extend(batch);

            if count < per_page {
                break;
            }
        }

        Ok(items)
    }
}
