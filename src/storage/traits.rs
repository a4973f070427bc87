//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::ProductStatus;
use crate::storage::{
    CategoryRecord, ProductDetails, ProductRecord, ProductSummary, RunRecord, SellerContact,
    SellerProfile, SellerRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Seller not found: {0}")]
    SellerNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the scans.
/// Every write is its own transaction; batch writes are all-or-nothing.
pub trait Storage {
    // ===== Categories =====

    /// Inserts a category, leaving an existing row with the same id untouched
    ///
    /// Returns true if a new row was written.
    fn insert_category(&mut self, id: i64, name: &str, parent_id: Option<i64>)
        -> StorageResult<bool>;

    /// Gets every category, ordered by id
    fn list_all_categories(&self) -> StorageResult<Vec<CategoryRecord>>;

    /// Gets the categories without a parent, ordered by id
    fn list_top_level_categories(&self) -> StorageResult<Vec<CategoryRecord>>;

    /// Records the listing count shown for a category
    fn update_product_count(&mut self, category_id: i64, product_count: u64)
        -> StorageResult<()>;

    // ===== Listings =====

    /// Inserts or refreshes a batch of listing links
    ///
    /// Identity is `listing_id`; name and url are last-write-wins and the
    /// scrape status of an existing listing is preserved. When `category_id`
    /// names a stored category the listings are linked to it. An empty batch
    /// is a no-op.
    ///
    /// # Returns
    ///
    /// The number of listings written
    fn upsert_products(
        &mut self,
        batch: &[ProductSummary],
        category_id: Option<i64>,
    ) -> StorageResult<usize>;

    /// Gets a listing by its marketplace id
    fn get_product_by_listing_id(&self, listing_id: i64) -> StorageResult<Option<ProductRecord>>;

    /// Gets listings in a given status, oldest first
    fn get_products_by_status(
        &self,
        status: ProductStatus,
        limit: Option<usize>,
    ) -> StorageResult<Vec<ProductRecord>>;

    /// Sets the scrape status of a listing
    fn update_product_status(
        &mut self,
        product_id: i64,
        status: ProductStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Stores detail-page fields, replacing images and attributes, and marks
    /// the listing scraped
    fn update_product_details(
        &mut self,
        product_id: i64,
        details: &ProductDetails,
    ) -> StorageResult<()>;

    /// Gets the image URLs of a listing in page order
    fn get_product_images(&self, product_id: i64) -> StorageResult<Vec<String>>;

    /// Gets the attribute rows of a listing in page order
    fn get_product_info(&self, product_id: i64) -> StorageResult<Vec<(String, String)>>;

    /// Gets the ids of the categories a listing was found in
    fn get_product_categories(&self, product_id: i64) -> StorageResult<Vec<i64>>;

    /// Gets the highest known marketplace listing id
    fn latest_listing_id(&self) -> StorageResult<Option<i64>>;

    // ===== Sellers =====

    /// Inserts a seller if its id is not yet known
    fn insert_seller(&mut self, seller: &SellerContact) -> StorageResult<()>;

    /// Gets every known seller id
    fn list_seller_ids(&self) -> StorageResult<Vec<i64>>;

    /// Gets a seller by id
    fn get_seller(&self, seller_id: i64) -> StorageResult<Option<SellerRecord>>;

    /// Stores profile-page fields for a seller
    fn update_seller_profile(&mut self, seller_id: i64, profile: &SellerProfile)
        -> StorageResult<()>;

    // ===== Scan Runs =====

    /// Creates a running scan record
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, kind: &str, scope: &str, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run completed with its delivery totals
    fn complete_run(
        &mut self,
        run_id: i64,
        pages_delivered: u64,
        products_delivered: u64,
    ) -> StorageResult<()>;

    /// Marks a run failed with whatever was delivered before the failure
    fn fail_run(
        &mut self,
        run_id: i64,
        pages_delivered: u64,
        products_delivered: u64,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Statistics =====

    /// Counts stored categories
    fn count_categories(&self) -> StorageResult<u64>;

    /// Counts stored listings
    fn count_products(&self) -> StorageResult<u64>;

    /// Counts listings in a given status
    fn count_products_by_status(&self, status: ProductStatus) -> StorageResult<u64>;

    /// Counts stored sellers
    fn count_sellers(&self) -> StorageResult<u64>;
}
