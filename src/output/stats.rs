//! Statistics generation from the sweep database
//!
//! This module provides functionality for extracting and displaying
//! sweep statistics from the storage layer.

use crate::state::ProductStatus;
use crate::storage::{RunRecord, Storage};
use crate::SweepError;

/// Runs shown by `print_statistics`
const RECENT_RUN_LIMIT: usize = 10;

/// Sweep statistics summary
#[derive(Debug, Clone)]
pub struct SweepStatistics {
    /// Number of categories discovered
    pub total_categories: u64,

    /// Number of listings discovered
    pub total_products: u64,

    /// Count of listings per scrape status, in status order
    pub products_by_status: Vec<(ProductStatus, u64)>,

    /// Number of sellers seen
    pub total_sellers: u64,

    /// Highest marketplace listing id seen
    pub latest_listing_id: Option<i64>,

    /// Most recent scan runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(SweepStatistics)` - Successfully loaded statistics
/// * `Err(SweepError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<SweepStatistics, SweepError> {
    let mut products_by_status = Vec::with_capacity(ProductStatus::ALL.len());
    for status in ProductStatus::ALL {
        products_by_status.push((status, storage.count_products_by_status(status)?));
    }

    Ok(SweepStatistics {
        total_categories: storage.count_categories()?,
        total_products: storage.count_products()?,
        products_by_status,
        total_sellers: storage.count_sellers()?,
        latest_listing_id: storage.latest_listing_id()?,
        recent_runs: storage.recent_runs(RECENT_RUN_LIMIT)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SweepStatistics) {
    println!("=== Sweep Statistics ===\n");

    println!("Overview:");
    println!("  Categories: {}", stats.total_categories);
    println!("  Listings: {}", stats.total_products);
    println!("  Sellers: {}", stats.total_sellers);
    if let Some(latest) = stats.latest_listing_id {
        println!("  Latest listing id: {}", latest);
    }
    println!();

    println!("Listings by Status:");
    for (status, count) in &stats.products_by_status {
        println!(
            "  {}: {} ({:.1}%)",
            status,
            count,
            percentage(*count, stats.total_products)
        );
    }
    println!();

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            println!(
                "  #{} {} [{}] {}: {} pages, {} listings (started {})",
                run.id,
                run.kind,
                run.scope,
                run.status.to_db_string(),
                run.pages_delivered,
                run.products_delivered,
                run.started_at
            );
        }
        println!();
    }

    let scraped = stats
        .products_by_status
        .iter()
        .find(|(status, _)| *status == ProductStatus::Scraped)
        .map(|(_, count)| *count)
        .unwrap_or(0);
    println!(
        "Detail coverage: {:.1}% ({} / {} listings scraped)",
        percentage(scraped, stats.total_products),
        scraped,
        stats.total_products
    );
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
