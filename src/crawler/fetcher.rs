//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests to the marketplace, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests with retry and exponential backoff for transient failures
//! - Error classification

use crate::config::SiteConfig;
use crate::SweepError;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Statuses retried with backoff before giving up
const RETRY_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Why a page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Fetch of page {page} did not complete: {message}")]
    Worker { page: u64, message: String },
}

impl FetchError {
    /// Returns true for an HTTP 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }

    /// Returns true if the same request might succeed when repeated
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } => true,
            Self::HttpStatus { status, .. } => RETRY_STATUSES.iter().any(|s| s.as_u16() == *status),
            _ => false,
        }
    }

    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect {
                url,
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// Exponential backoff for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(site: &SiteConfig) -> Self {
        Self {
            max_retries: site.max_retries,
            backoff: site.retry_backoff(),
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    /// URL after any redirects the client followed
    pub final_url: String,
    pub body: String,
}

impl FetchedPage {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Builds an HTTP client for the marketplace
///
/// # Arguments
///
/// * `site` - The site configuration
/// * `follow_redirects` - Whether 3xx responses are followed or returned as-is
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(site: &SiteConfig, follow_redirects: bool) -> Result<Client, reqwest::Error> {
    let redirect = if follow_redirects {
        Policy::limited(10)
    } else {
        Policy::none()
    };

    Client::builder()
        .user_agent(site.user_agent.as_str())
        .timeout(site.request_timeout())
        .connect_timeout(site.request_timeout().min(Duration::from_secs(10)))
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout, connection failure | Retry with backoff |
/// | HTTP 500, 502, 503, 504 | Retry with backoff |
/// | Any other 4xx/5xx | `HttpStatus` immediately |
/// | 2xx, 3xx | Returned as a `FetchedPage` |
///
/// The delay before retry `n` is `backoff * 2^n`.
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    retry: &RetryPolicy,
) -> Result<FetchedPage, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_once(client, url).await {
            Err(e) if e.is_transient() && attempt < retry.max_retries => {
                let delay = retry.delay(attempt);
                tracing::debug!(
                    "Retrying {} in {:?} ({}/{}): {}",
                    url,
                    delay,
                    attempt + 1,
                    retry.max_retries,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn fetch_once(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();
    let body = response.text().await.map_err(|e| FetchError::Body {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok(FetchedPage {
        status: status.as_u16(),
        final_url,
        body,
    })
}

/// HTTP client bound to the marketplace origin
#[derive(Debug, Clone)]
pub struct SiteClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl SiteClient {
    pub fn new(site: &SiteConfig, follow_redirects: bool) -> Result<Self, SweepError> {
        Ok(Self {
            client: build_http_client(site, follow_redirects)?,
            base_url: Url::parse(&site.base_url)?,
            retry: RetryPolicy::from_config(site),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a path against the marketplace origin
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    pub async fn get(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        fetch_page(&self.client, url, &self.retry).await
    }
}
