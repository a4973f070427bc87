//! Adapter that lets a scan deliver pages straight into storage

use crate::crawler::ProductSink;
use crate::storage::{ProductSummary, Storage, StorageError};

/// Writes delivered pages to a [`Storage`], linking them to one category
pub struct StorageSink<'a, S: Storage + ?Sized> {
    storage: &'a mut S,
    category_id: Option<i64>,
}

impl<'a, S: Storage + ?Sized> StorageSink<'a, S> {
    pub fn new(storage: &'a mut S, category_id: Option<i64>) -> Self {
        Self {
            storage,
            category_id,
        }
    }
}

impl<S: Storage + ?Sized> ProductSink for StorageSink<'_, S> {
    fn upsert_batch(&mut self, batch: &[ProductSummary]) -> Result<usize, StorageError> {
        self.storage.upsert_products(batch, self.category_id)
    }
}
