//! Sliding-window scheduler for paginated result scans
//!
//! A scan walks result pages 0, 1, 2, ... of one category or recency filter
//! without knowing how many pages exist. Up to `max_workers` page fetches run
//! at once, but pages are handed to the sink strictly in index order: the
//! scheduler always waits on the handle of the next page to deliver, never on
//! whichever fetch happens to finish first. The first page that comes back
//! empty ends the scan and every fetch still outstanding is abandoned.

use crate::config::{FailurePolicyKind, ScanConfig};
use crate::crawler::FetchError;
use crate::storage::{ProductSummary, StorageError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Zero-based offset of a result page within one scan
pub type PageIndex = u64;

/// Filter a scan runs under
///
/// A category link scan sets only `category_id`; a recency update scan sets
/// `days` and optionally `category_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub category_id: Option<i64>,
    pub days: Option<u32>,
}

impl ScanContext {
    /// Every listing in one category
    pub fn category(category_id: i64) -> Self {
        Self {
            category_id: Some(category_id),
            days: None,
        }
    }

    /// Listings updated within the last `days`, optionally within a category
    pub fn recent(category_id: Option<i64>, days: Option<u32>) -> Self {
        Self { category_id, days }
    }

    /// Returns true if neither filter is set
    pub fn is_unfiltered(&self) -> bool {
        self.category_id.is_none() && self.days.is_none()
    }
}

impl fmt::Display for ScanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.category_id, self.days) {
            (Some(id), Some(days)) => write!(f, "category {}, last {} days", id, days),
            (Some(id), None) => write!(f, "category {}", id),
            (None, Some(days)) => write!(f, "last {} days", days),
            (None, None) => write!(f, "unfiltered"),
        }
    }
}

/// Result of fetching one result page
#[derive(Debug)]
pub enum PageOutcome {
    /// The page listed products (possibly none that could be parsed)
    Products(Vec<ProductSummary>),

    /// The page had no listings, or does not exist
    End,

    /// The page could not be fetched
    Failed(FetchError),
}

/// Fetches one result page of a scan
///
/// Implementations must not share mutable state between calls; the scheduler
/// invokes `fetch` for several pages of the same scan concurrently.
#[async_trait]
pub trait PageFetcher: Send + Sync + 'static {
    async fn fetch(&self, context: &ScanContext, page: PageIndex) -> PageOutcome;
}

/// Receives each delivered page's products, in page order
///
/// Must accept an empty batch and tolerate the same listing arriving twice.
pub trait ProductSink {
    /// Persists one page of products, returning how many were written
    fn upsert_batch(&mut self, batch: &[ProductSummary]) -> Result<usize, StorageError>;
}

/// What a `Failed` page outcome means for the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// A failed page ends the scan exactly like an empty one
    EndOnEmpty,

    /// A failed page is fetched again, up to `retries` more times, before
    /// the scan ends
    RetryOnFailure { retries: u32 },
}

impl FailurePolicy {
    pub fn from_config(config: &ScanConfig) -> Self {
        match config.failure_policy {
            FailurePolicyKind::EndOnEmpty => Self::EndOnEmpty,
            FailurePolicyKind::RetryOnFailure => Self::RetryOnFailure {
                retries: config.failure_retries,
            },
        }
    }
}

/// Per-scan scheduler settings
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Maximum page fetches outstanding at once
    pub max_workers: usize,

    pub failure_policy: FailurePolicy,

    /// Fetch page 0 alone and open the window only once it lists products,
    /// so an empty scan costs a single request
    pub probe_first_page: bool,
}

impl WindowConfig {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            failure_policy: FailurePolicy::EndOnEmpty,
            probe_first_page: false,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_probe_first_page(mut self, probe: bool) -> Self {
        self.probe_first_page = probe;
        self
    }
}

/// Why a scan stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEnd {
    /// A page came back empty or missing
    Exhausted,

    /// A page could not be fetched
    Failed(String),
}

/// Totals for one finished scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Pages handed to the sink, including ones the sink rejected
    pub pages_delivered: u64,

    /// Products the sink accepted
    pub products_delivered: u64,

    /// Pages the sink rejected
    pub sink_failures: u64,

    /// Index of the page that ended the scan
    pub end_page: PageIndex,

    pub end: ScanEnd,
}

/// Drives scans over a page fetcher
///
/// Each call to [`WindowScheduler::run`] owns a fresh worker pool and window
/// state; nothing is shared between runs except the fetcher.
pub struct WindowScheduler<F: PageFetcher> {
    fetcher: Arc<F>,
    config: WindowConfig,
}

impl<F: PageFetcher> WindowScheduler<F> {
    pub fn new(fetcher: Arc<F>, config: WindowConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Runs one scan to completion
    ///
    /// # Delivery Order
    ///
    /// 1. Wait for the handle of `next_deliver`, and only that handle
    /// 2. `End` stops the scan; `Failed` stops it or re-dispatches the same
    ///    page, depending on the failure policy; `Products` goes to the sink
    /// 3. Dispatch every page in `[next_deliver, next_deliver + max_workers)`
    ///    that is not yet in flight
    ///
    /// A sink error is logged and counted; the scan carries on with the next
    /// page. Nothing here returns an error: how the scan ended is in the
    /// report.
    pub async fn run<S>(&self, context: ScanContext, sink: &mut S) -> ScanReport
    where
        S: ProductSink + ?Sized,
    {
        let context = Arc::new(context);
        let workers = Arc::new(Semaphore::new(self.config.max_workers));
        let mut in_flight: BTreeMap<PageIndex, JoinHandle<PageOutcome>> = BTreeMap::new();

        let mut next_deliver: PageIndex = 0;
        let mut next_dispatch: PageIndex = 0;
        let mut retries_used: u32 = 0;

        let mut pages_delivered = 0u64;
        let mut products_delivered = 0u64;
        let mut sink_failures = 0u64;

        let initial = if self.config.probe_first_page {
            1
        } else {
            self.config.max_workers as PageIndex
        };
        while next_dispatch < initial {
            in_flight.insert(next_dispatch, self.dispatch(&workers, &context, next_dispatch));
            next_dispatch += 1;
        }

        let end = loop {
            let handle = match in_flight.remove(&next_deliver) {
                Some(handle) => handle,
                None => {
                    in_flight.insert(next_deliver, self.dispatch(&workers, &context, next_deliver));
                    next_dispatch = next_dispatch.max(next_deliver + 1);
                    continue;
                }
            };

            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => PageOutcome::Failed(FetchError::Worker {
                    page: next_deliver,
                    message: e.to_string(),
                }),
            };

            match outcome {
                PageOutcome::Products(batch) => {
                    retries_used = 0;
                    match sink.upsert_batch(&batch) {
                        Ok(written) => {
                            products_delivered += written as u64;
                            tracing::info!(
                                "Scraped {} products for {}, page {}",
                                batch.len(),
                                context,
                                next_deliver
                            );
                        }
                        Err(e) => {
                            sink_failures += 1;
                            tracing::error!(
                                "Failed to store {} products for {}, page {}: {}",
                                batch.len(),
                                context,
                                next_deliver,
                                e
                            );
                        }
                    }
                    pages_delivered += 1;
                    next_deliver += 1;
                }

                PageOutcome::End => {
                    tracing::info!("No products found for {}, page {}", context, next_deliver);
                    break ScanEnd::Exhausted;
                }

                PageOutcome::Failed(error) => match self.config.failure_policy {
                    FailurePolicy::RetryOnFailure { retries } if retries_used < retries => {
                        retries_used += 1;
                        tracing::warn!(
                            "Page {} of {} failed ({}), retrying ({}/{})",
                            next_deliver,
                            context,
                            error,
                            retries_used,
                            retries
                        );
                        in_flight.insert(next_deliver, self.dispatch(&workers, &context, next_deliver));
                        continue;
                    }
                    _ => {
                        tracing::warn!(
                            "Page {} of {} failed, ending scan: {}",
                            next_deliver,
                            context,
                            error
                        );
                        break ScanEnd::Failed(error.to_string());
                    }
                },
            }

            let window_end = next_deliver + self.config.max_workers as PageIndex;
            next_dispatch = next_dispatch.max(next_deliver);
            while next_dispatch < window_end {
                if !in_flight.contains_key(&next_dispatch) {
                    in_flight.insert(next_dispatch, self.dispatch(&workers, &context, next_dispatch));
                }
                next_dispatch += 1;
            }
        };

        // Results of pages past the end are never looked at
        for (_, handle) in in_flight {
            handle.abort();
        }

        tracing::info!(
            "Finished {}: {} pages, {} products",
            context,
            pages_delivered,
            products_delivered
        );

        ScanReport {
            pages_delivered,
            products_delivered,
            sink_failures,
            end_page: next_deliver,
            end,
        }
    }

    fn dispatch(
        &self,
        workers: &Arc<Semaphore>,
        context: &Arc<ScanContext>,
        page: PageIndex,
    ) -> JoinHandle<PageOutcome> {
        let fetcher = Arc::clone(&self.fetcher);
        let workers = Arc::clone(workers);
        let context = Arc::clone(context);

        tracing::trace!("Dispatching page {} of {}", page, context);

        tokio::spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return PageOutcome::Failed(FetchError::Worker {
                        page,
                        message: e.to_string(),
                    })
                }
            };
            fetcher.fetch(&context, page).await
        })
    }
}
