use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Bazaar-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    pub output: OutputConfig,
}

/// Marketplace origin and HTTP behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root of the marketplace, e.g. `https://ibay.com.mv`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Automatic retries for timeouts, connection failures and 5xx responses
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl SiteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Paginated scan behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Concurrent page fetches per category during a link scan
    #[serde(rename = "link-workers", default = "default_link_workers")]
    pub link_workers: usize,

    /// Concurrent page fetches during a recency update scan
    #[serde(rename = "update-workers", default = "default_update_workers")]
    pub update_workers: usize,

    /// Listings requested per result page (`hw_num`)
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// What a failed page fetch means for the running scan
    #[serde(rename = "failure-policy", default)]
    pub failure_policy: FailurePolicyKind,

    /// Extra attempts per page under `retry-on-failure`
    #[serde(rename = "failure-retries", default = "default_failure_retries")]
    pub failure_retries: u32,

    /// Fetch page 0 alone before opening the window
    #[serde(rename = "probe-first-page", default)]
    pub probe_first_page: bool,

    /// Default recency window for update scans (days)
    #[serde(rename = "update-days", default)]
    pub update_days: Option<u32>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            link_workers: default_link_workers(),
            update_workers: default_update_workers(),
            page_size: default_page_size(),
            failure_policy: FailurePolicyKind::default(),
            failure_retries: default_failure_retries(),
            probe_first_page: false,
            update_days: None,
        }
    }
}

/// Config-file spelling of the scan failure policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicyKind {
    /// A failed fetch ends the scan, exactly like an empty page
    #[default]
    EndOnEmpty,
    /// A failed fetch is re-dispatched before the scan gives up
    RetryOnFailure,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    100
}

fn default_link_workers() -> usize {
    5
}

fn default_update_workers() -> usize {
    15
}

fn default_page_size() -> u32 {
    100
}

fn default_failure_retries() -> u32 {
    2
}
