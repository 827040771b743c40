//! HTTP client for page fetches with rate limiting and cancellation
//!
//! Responses are handed back unread: the body is consumed chunk by chunk
//! by the streaming scanner.

use std::num::NonZeroU32;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, Response,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::streaming::ChunkSource;

/// Failure to obtain a response body to scan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Upstream returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} was cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Upstream HTTP status, when the server answered at all
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Source of page bodies for the probe service
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Start fetching `url` and return its body as a chunk source
    async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<Box<dyn ChunkSource>, FetchError>;
}

/// Rate-limited HTTP client
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?);

        let redirect = if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects)
        };

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .default_headers(headers)
            .redirect(redirect)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(NonZeroU32::new(config.max_requests_per_second).context("Rate limit must be greater than 0")?);
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Send a rate-limited GET and return the response with its body unread.
    ///
    /// Non-2xx statuses are rejected before any body bytes are read.
    pub async fn fetch_stream(&self, url: &Url, cancel: &CancellationToken) -> Result<Response, FetchError> {
        let cancelled = || FetchError::Cancelled { url: url.to_string() };

        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        tokio::select! {
            () = self.rate_limiter.until_ready() => {},
            () = cancel.cancelled() => return Err(cancelled()),
        }

        tracing::info!("Fetching URL: {}", url);

        let response = tokio::select! {
            result = self.client.get(url.clone()).send() => {
                result.map_err(|e| FetchError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                })?
            },
            () = cancel.cancelled() => {
                tracing::warn!("HTTP request cancelled for URL: {}", url);
                return Err(cancelled());
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Upstream returned {} for {}", status, url);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        tracing::debug!("Response headers received: {} ({})", url, status);
        Ok(response)
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<Box<dyn ChunkSource>, FetchError> {
        let response = self.fetch_stream(url, cancel).await?;
        Ok(Box::new(response))
    }
}
