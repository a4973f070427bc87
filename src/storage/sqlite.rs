//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::ProductStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CategoryRecord, ProductDetails, ProductRecord, ProductSummary, RunRecord, RunStatus,
    SellerContact, SellerProfile, SellerRecord,
};
use crate::SweepError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const PRODUCT_COLUMNS: &str = "id, listing_id, name, url, status, seller_id, price, price_text,
     product_location, description, favourite_count, last_updated, error_message,
     created_at, updated_at";

const RUN_COLUMNS: &str = "id, kind, scope, config_hash, status, started_at, finished_at,
     pages_delivered, products_delivered";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SweepError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SweepError> {
        let conn = init_database(path)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SweepError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_delivered: u64,
        products_delivered: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE scan_runs SET status = ?1, finished_at = ?2, pages_delivered = ?3,
             products_delivered = ?4 WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                pages_delivered as i64,
                products_delivered as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn map_category(row: &Row<'_>) -> rusqlite::Result<CategoryRecord> {
    Ok(CategoryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        product_count: row.get(3)?,
    })
}

fn map_product(row: &Row<'_>) -> rusqlite::Result<ProductRecord> {
    Ok(ProductRecord {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        status: ProductStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(ProductStatus::NotScraped),
        seller_id: row.get(5)?,
        price: row.get(6)?,
        price_text: row.get(7)?,
        location: row.get(8)?,
        description: row.get(9)?,
        favourite_count: row.get(10)?,
        last_updated: row.get(11)?,
        error_message: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn map_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        kind: row.get(1)?,
        scope: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        pages_delivered: row.get::<_, i64>(7)? as u64,
        products_delivered: row.get::<_, i64>(8)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Categories =====

    fn insert_category(
        &mut self,
        id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO categories (id, name, parent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4) ON CONFLICT(id) DO NOTHING",
            params![id, name, parent_id, now],
        )?;
        Ok(inserted > 0)
    }

    fn list_all_categories(&self) -> StorageResult<Vec<CategoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, parent_id, product_count FROM categories ORDER BY id",
        )?;
        let categories = stmt
            .query_map([], map_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn list_top_level_categories(&self) -> StorageResult<Vec<CategoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, parent_id, product_count FROM categories
             WHERE parent_id IS NULL ORDER BY id",
        )?;
        let categories = stmt
            .query_map([], map_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn update_product_count(
        &mut self,
        category_id: i64,
        product_count: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE categories SET product_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![product_count as i64, now, category_id],
        )?;
        Ok(())
    }

    // ===== Listings =====

    fn upsert_products(
        &mut self,
        batch: &[ProductSummary],
        category_id: Option<i64>,
    ) -> StorageResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO products (listing_id, name, url, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(listing_id) DO UPDATE SET
                     name = excluded.name,
                     url = excluded.url,
                     updated_at = excluded.updated_at",
            )?;
            // Links only when the category row exists, so filtered scans over
            // unknown category ids still store their listings.
            let mut link = tx.prepare(
                "INSERT OR IGNORE INTO product_categories (product_id, category_id, created_at)
                 SELECT p.id, c.id, ?3 FROM products p, categories c
                 WHERE p.listing_id = ?1 AND c.id = ?2",
            )?;

            for product in batch {
                upsert.execute(params![
                    product.listing_id,
                    product.name,
                    product.url,
                    ProductStatus::NotScraped.to_db_string(),
                    now
                ])?;

                if let Some(category_id) = category_id {
                    link.execute(params![product.listing_id, category_id, now])?;
                }
            }
        }
        tx.commit()?;

        Ok(batch.len())
    }

    fn get_product_by_listing_id(&self, listing_id: i64) -> StorageResult<Option<ProductRecord>> {
        let sql = format!("SELECT {} FROM products WHERE listing_id = ?1", PRODUCT_COLUMNS);
        let product = self
            .conn
            .query_row(&sql, params![listing_id], map_product)
            .optional()?;
        Ok(product)
    }

    fn get_products_by_status(
        &self,
        status: ProductStatus,
        limit: Option<usize>,
    ) -> StorageResult<Vec<ProductRecord>> {
        let sql = format!(
            "SELECT {} FROM products WHERE status = ?1 ORDER BY id LIMIT ?2",
            PRODUCT_COLUMNS
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = self.conn.prepare(&sql)?;
        let products = stmt
            .query_map(params![status.to_db_string(), limit], map_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    fn update_product_status(
        &mut self,
        product_id: i64,
        status: ProductStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE products SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.to_db_string(), error_message, now, product_id],
        )?;

        if updated == 0 {
            return Err(StorageError::ProductNotFound(product_id));
        }
        Ok(())
    }

    fn update_product_details(
        &mut self,
        product_id: i64,
        details: &ProductDetails,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        if let Some(seller) = &details.seller {
            tx.execute(
                "INSERT INTO sellers (id, name, contact_number, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4) ON CONFLICT(id) DO NOTHING",
                params![seller.id, seller.name, seller.contact_number, now],
            )?;
        }

        let updated = tx.execute(
            "UPDATE products SET
                 name = COALESCE(?1, name), price = ?2, price_text = ?3,
                 product_location = ?4, description = ?5, favourite_count = ?6,
                 last_updated = ?7, seller_id = ?8, status = ?9, error_message = NULL,
                 updated_at = ?10
             WHERE id = ?11",
            params![
                details.name,
                details.price,
                details.price_text,
                details.location,
                details.description,
                details.favourite_count,
                details.last_updated,
                details.seller.as_ref().map(|s| s.id),
                ProductStatus::Scraped.to_db_string(),
                now,
                product_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::ProductNotFound(product_id));
        }

        tx.execute(
            "DELETE FROM product_images WHERE product_id = ?1",
            params![product_id],
        )?;
        tx.execute(
            "DELETE FROM product_info WHERE product_id = ?1",
            params![product_id],
        )?;
        {
            let mut image = tx.prepare(
                "INSERT INTO product_images (product_id, image_url) VALUES (?1, ?2)",
            )?;
            for url in &details.images {
                image.execute(params![product_id, url])?;
            }

            let mut info = tx.prepare(
                "INSERT INTO product_info (product_id, info_key, info_value) VALUES (?1, ?2, ?3)",
            )?;
            for (key, value) in &details.info {
                info.execute(params![product_id, key, value])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn get_product_images(&self, product_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT image_url FROM product_images WHERE product_id = ?1 ORDER BY id")?;
        let images = stmt
            .query_map(params![product_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    fn get_product_info(&self, product_id: i64) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT info_key, info_value FROM product_info WHERE product_id = ?1 ORDER BY id",
        )?;
        let info = stmt
            .query_map(params![product_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(info)
    }

    fn get_product_categories(&self, product_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id FROM product_categories WHERE product_id = ?1 ORDER BY category_id",
        )?;
        let categories = stmt
            .query_map(params![product_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn latest_listing_id(&self) -> StorageResult<Option<i64>> {
        let latest: Option<i64> =
            self.conn
                .query_row("SELECT MAX(listing_id) FROM products", [], |row| row.get(0))?;
        Ok(latest)
    }

    // ===== Sellers =====

    fn insert_seller(&mut self, seller: &SellerContact) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sellers (id, name, contact_number, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4) ON CONFLICT(id) DO NOTHING",
            params![seller.id, seller.name, seller.contact_number, now],
        )?;
        Ok(())
    }

    fn list_seller_ids(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM sellers ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn get_seller(&self, seller_id: i64) -> StorageResult<Option<SellerRecord>> {
        let seller = self
            .conn
            .query_row(
                "SELECT id, name, contact_number, image_src, is_premium, description, location,
                 member_since, last_login FROM sellers WHERE id = ?1",
                params![seller_id],
                |row| {
                    Ok(SellerRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        contact_number: row.get(2)?,
                        profile: SellerProfile {
                            image_src: row.get(3)?,
                            is_premium: row.get(4)?,
                            description: row.get(5)?,
                            location: row.get(6)?,
                            member_since: row.get(7)?,
                            last_login: row.get(8)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(seller)
    }

    fn update_seller_profile(
        &mut self,
        seller_id: i64,
        profile: &SellerProfile,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE sellers SET image_src = ?1, is_premium = ?2, description = ?3, location = ?4,
             member_since = ?5, last_login = ?6, updated_at = ?7 WHERE id = ?8",
            params![
                profile.image_src,
                profile.is_premium,
                profile.description,
                profile.location,
                profile.member_since,
                profile.last_login,
                now,
                seller_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::SellerNotFound(seller_id));
        }
        Ok(())
    }

    // ===== Scan Runs =====

    fn create_run(&mut self, kind: &str, scope: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO scan_runs (kind, scope, config_hash, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![kind, scope, config_hash, RunStatus::Running.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        pages_delivered: u64,
        products_delivered: u64,
    ) -> StorageResult<()> {
        self.finish_run(run_id, RunStatus::Completed, pages_delivered, products_delivered)
    }

    fn fail_run(
        &mut self,
        run_id: i64,
        pages_delivered: u64,
        products_delivered: u64,
    ) -> StorageResult<()> {
        self.finish_run(run_id, RunStatus::Failed, pages_delivered, products_delivered)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM scan_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], map_run)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM scan_runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![limit as i64], map_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Statistics =====

    fn count_categories(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM categories")
    }

    fn count_products(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM products")
    }

    fn count_products_by_status(&self, status: ProductStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_sellers(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM sellers")
    }
}

/// Opens a database file and brings its schema up to date
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Configured connection with the schema in place
/// * `Err(rusqlite::Error)` - Failed to open or initialize the database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
