//! Crawler module for marketplace scans
//!
//! This module contains the scanning logic, including:
//! - HTTP fetching with retry logic
//! - HTML and JSON parsing of marketplace pages
//! - The sliding-window scheduler for paginated result scans
//! - Scan drivers for links, recent updates, categories, counts, details
//!   and sellers

mod categories;
mod counts;
mod details;
mod fetcher;
mod links;
mod listing;
mod parser;
mod runs;
mod sellers;
mod updates;
mod window;

#[cfg(test)]
mod test_support;

pub use categories::{discover_categories, DiscoverySummary, ROOT_CATEGORY_ID};
pub use counts::update_product_counts;
pub use details::{scrape_product_details, DetailSummary};
pub use fetcher::{build_http_client, fetch_page, FetchError, FetchedPage, RetryPolicy, SiteClient};
pub use links::{run_link_scan, scan_category_links, CategoryScan};
pub use listing::{listing_scheduler, search_url, HttpListingFetcher};
pub use parser::{
    listing_id_from_url, parse_category_children, parse_last_updated, parse_listing_page,
    parse_price, parse_product_count, parse_product_details, parse_seller_profile,
};
pub use runs::{tracked_scan, ScanKind};
pub use sellers::{scrape_seller_profiles, SellerSummary};
pub use updates::{run_update_scan, scan_recent};
pub use window::{
    FailurePolicy, PageFetcher, PageIndex, PageOutcome, ProductSink, ScanContext, ScanEnd,
    ScanReport, WindowConfig, WindowScheduler,
};
