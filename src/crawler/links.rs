//! Category link scan
//!
//! Walks every top-level category with its own scan, one after another.
//! Each category gets a fresh window starting from page 0.

use crate::config::Config;
use crate::crawler::listing::listing_scheduler;
use crate::crawler::runs::{tracked_scan, ScanKind};
use crate::crawler::window::{PageFetcher, ScanContext, ScanReport, WindowScheduler};
use crate::storage::{CategoryRecord, Storage};
use crate::SweepError;

/// Outcome of the scan of one category
#[derive(Debug, Clone)]
pub struct CategoryScan {
    pub category_id: i64,
    pub name: String,
    pub report: ScanReport,
}

/// Scans the given categories into storage
pub async fn scan_category_links<F, S>(
    scheduler: &WindowScheduler<F>,
    storage: &mut S,
    categories: &[CategoryRecord],
    config_hash: &str,
) -> Vec<CategoryScan>
where
    F: PageFetcher,
    S: Storage + ?Sized,
{
    let mut scans = Vec::with_capacity(categories.len());

    for (i, category) in categories.iter().enumerate() {
        tracing::info!(
            "Scanning category {} ({}) [{}/{}]",
            category.name,
            category.id,
            i + 1,
            categories.len()
        );

        let report = tracked_scan(
            scheduler,
            storage,
            ScanKind::Links,
            ScanContext::category(category.id),
            config_hash,
        )
        .await;

        scans.push(CategoryScan {
            category_id: category.id,
            name: category.name.clone(),
            report,
        });
    }

    scans
}

/// Runs the link scan over every stored top-level category
///
/// # Returns
///
/// One entry per category, in category id order. Empty when no categories
/// have been discovered yet.
pub async fn run_link_scan<S>(
    config: &Config,
    config_hash: &str,
    storage: &mut S,
) -> Result<Vec<CategoryScan>, SweepError>
where
    S: Storage + ?Sized,
{
    let categories = storage.list_top_level_categories()?;
    if categories.is_empty() {
        tracing::warn!("No categories stored; run category discovery first");
        return Ok(Vec::new());
    }

    let scheduler = listing_scheduler(config, config.scan.link_workers)?;
    Ok(scan_category_links(&scheduler, storage, &categories, config_hash).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::test_support::PagedFetcher;
    use crate::crawler::window::{ScanEnd, WindowConfig};
    use crate::storage::{RunStatus, SqliteStorage};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_each_category_is_scanned_and_linked() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.insert_category(1, "Vehicles", None).unwrap();
        storage.insert_category(2, "Electronics", None).unwrap();
        storage.insert_category(21, "Phones", Some(2)).unwrap();

        let fetcher = Arc::new(PagedFetcher::new([(Some(1), 3), (Some(2), 1)]));
        let scheduler = WindowScheduler::new(Arc::clone(&fetcher), WindowConfig::new(2));
        let categories = storage.list_top_level_categories().unwrap();

        let scans = scan_category_links(&scheduler, &mut storage, &categories, "abc123").await;

        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].category_id, 1);
        assert_eq!(scans[0].report.pages_delivered, 3);
        assert_eq!(scans[1].report.pages_delivered, 1);
        assert!(scans.iter().all(|s| s.report.end == ScanEnd::Exhausted));

        assert_eq!(storage.count_products().unwrap(), 8);
        let product = storage.get_product_by_listing_id(10_000).unwrap().unwrap();
        assert_eq!(storage.get_product_categories(product.id).unwrap(), vec![1]);
        let product = storage.get_product_by_listing_id(20_001).unwrap().unwrap();
        assert_eq!(storage.get_product_categories(product.id).unwrap(), vec![2]);

        let runs = storage.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.kind == "links" && r.config_hash == "abc123"));
        assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.insert_category(5, "Boats", None).unwrap();
        let categories = storage.list_top_level_categories().unwrap();
        let fetcher = Arc::new(PagedFetcher::new([(Some(5), 4)]));
        let scheduler = WindowScheduler::new(fetcher, WindowConfig::new(3));

        scan_category_links(&scheduler, &mut storage, &categories, "h").await;
        scan_category_links(&scheduler, &mut storage, &categories, "h").await;

        assert_eq!(storage.count_products().unwrap(), 8);
    }
}
