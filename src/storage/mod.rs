//! Storage module for persisting marketplace data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Category tree and per-category listing counts
//! - Idempotent bulk upsert of listing links
//! - Listing details, images, attributes and sellers
//! - Scan run tracking

mod schema;
mod sink;
mod sqlite;
mod traits;

pub use sink::StorageSink;
pub use sqlite::{init_database, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::ProductStatus;
use crate::SweepError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SweepError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SweepError> {
    SqliteStorage::new(path)
}

/// One listing link found on a result page
///
/// `listing_id` is the marketplace's own identifier and the identity key for
/// upserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub listing_id: i64,
    pub name: String,
    pub url: String,
}

/// A category in the marketplace tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub product_count: i64,
}

/// A stored listing
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub id: i64,
    pub listing_id: i64,
    pub name: String,
    pub url: String,
    pub status: ProductStatus,
    pub seller_id: Option<i64>,
    pub price: Option<f64>,
    pub price_text: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub favourite_count: Option<i64>,
    pub last_updated: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields extracted from a listing's detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDetails {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub price_text: Option<String>,
    pub images: Vec<String>,
    pub location: Option<String>,
    /// Attribute rows other than `Location`, in page order
    pub info: Vec<(String, String)>,
    pub description: Option<String>,
    pub favourite_count: Option<i64>,
    /// `YYYY-MM-DD`
    pub last_updated: Option<String>,
    pub seller: Option<SellerContact>,
}

/// Seller identity as shown on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerContact {
    pub id: i64,
    pub name: Option<String>,
    pub contact_number: Option<String>,
}

/// Fields extracted from a seller's profile page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellerProfile {
    pub image_src: Option<String>,
    pub is_premium: bool,
    pub description: Option<String>,
    pub location: Option<String>,
    pub member_since: Option<String>,
    pub last_login: Option<String>,
}

/// A stored seller
#[derive(Debug, Clone)]
pub struct SellerRecord {
    pub id: i64,
    pub name: Option<String>,
    pub contact_number: Option<String>,
    pub profile: SellerProfile,
}

/// Represents one recorded scan task
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: String,
    pub scope: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub pages_delivered: u64,
    pub products_delivered: u64,
}

/// Status of a scan run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
