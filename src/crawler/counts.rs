//! Per-category listing counts

use crate::crawler::fetcher::SiteClient;
use crate::crawler::parser::parse_product_count;
use crate::storage::Storage;
use crate::SweepError;

/// Fetches each stored category's landing page and records its listing count
///
/// A page without a readable count records 0. Fetch failures are logged and
/// leave the stored count unchanged.
///
/// # Returns
///
/// The number of categories whose count was updated
pub async fn update_product_counts<S>(client: &SiteClient, storage: &mut S) -> Result<usize, SweepError>
where
    S: Storage + ?Sized,
{
    let categories = storage.list_all_categories()?;
    let mut updated = 0;

    for category in &categories {
        let url = client.url(&format!("processor-b{}_0.html", category.id))?;
        let page = match client.get(&url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to fetch count for {} ({}): {}", category.name, category.id, e);
                continue;
            }
        };

        let count = parse_product_count(&page.body).unwrap_or(0);
        storage.update_product_count(category.id, count)?;
        tracing::info!("{} ({}): {} listings", category.name, category.id, count);
        updated += 1;
    }

    Ok(updated)
}
