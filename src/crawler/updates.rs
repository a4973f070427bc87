//! Recency update scan
//!
//! One scan over listings updated within the last N days, optionally limited
//! to a category. With neither filter there is nothing to bound the scan, so
//! it does not run.

use crate::config::Config;
use crate::crawler::listing::listing_scheduler;
use crate::crawler::runs::{tracked_scan, ScanKind};
use crate::crawler::window::{PageFetcher, ScanContext, ScanReport, WindowScheduler};
use crate::storage::Storage;
use crate::SweepError;

/// Runs one recency scan into storage
///
/// Returns `None` without dispatching anything when `context` carries neither
/// a category nor a day window.
pub async fn scan_recent<F, S>(
    scheduler: &WindowScheduler<F>,
    storage: &mut S,
    context: ScanContext,
    config_hash: &str,
) -> Option<ScanReport>
where
    F: PageFetcher,
    S: Storage + ?Sized,
{
    if context.is_unfiltered() {
        tracing::info!("No category or day window given, skipping update scan");
        return None;
    }

    tracing::info!("Scanning updated listings ({})", context);
    Some(tracked_scan(scheduler, storage, ScanKind::Updates, context, config_hash).await)
}

/// Runs the recency scan with live search pages
///
/// `days` falls back to `[scan] update-days` when not given.
pub async fn run_update_scan<S>(
    config: &Config,
    config_hash: &str,
    storage: &mut S,
    category_id: Option<i64>,
    days: Option<u32>,
) -> Result<Option<ScanReport>, SweepError>
where
    S: Storage + ?Sized,
{
    let context = ScanContext::recent(category_id, days.or(config.scan.update_days));
    let scheduler = listing_scheduler(config, config.scan.update_workers)?;
    Ok(scan_recent(&scheduler, storage, context, config_hash).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::test_support::PagedFetcher;
    use crate::crawler::window::WindowConfig;
    use crate::state::ProductStatus;
    use crate::storage::{ProductDetails, SqliteStorage};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unfiltered_scan_is_a_no_op() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let fetcher = Arc::new(PagedFetcher::new([(None, 5)]));
        let scheduler = WindowScheduler::new(Arc::clone(&fetcher), WindowConfig::new(4));

        let report = scan_recent(&scheduler, &mut storage, ScanContext::recent(None, None), "h").await;

        assert!(report.is_none());
        assert_eq!(fetcher.request_count(), 0);
        assert!(storage.recent_runs(5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_scan_keeps_scrape_status() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let fetcher = Arc::new(PagedFetcher::new([(None, 2)]));
        let scheduler = WindowScheduler::new(Arc::clone(&fetcher), WindowConfig::new(3));

        scan_recent(&scheduler, &mut storage, ScanContext::recent(None, Some(3)), "h").await;
        let product = storage.get_product_by_listing_id(1).unwrap().unwrap();
        storage
            .update_product_details(product.id, &ProductDetails::default())
            .unwrap();

        let report = scan_recent(&scheduler, &mut storage, ScanContext::recent(None, Some(3)), "h")
            .await
            .unwrap();

        assert_eq!(report.pages_delivered, 2);
        assert_eq!(storage.count_products().unwrap(), 4);
        let product = storage.get_product_by_listing_id(1).unwrap().unwrap();
        assert_eq!(product.status, ProductStatus::Scraped);

        let runs = storage.recent_runs(5).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].kind, "updates");
        assert_eq!(runs[0].scope, "last 3 days");
    }
}
