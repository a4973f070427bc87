//! Listing detail scraping
//!
//! Visits every listing not yet scraped. The client used here must not
//! follow redirects: the marketplace answers removed listings with a 3xx to
//! its front page.

use crate::crawler::fetcher::SiteClient;
use crate::crawler::parser::parse_product_details;
use crate::state::ProductStatus;
use crate::storage::{ProductRecord, Storage};
use crate::SweepError;
use url::Url;

/// Totals for one detail pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailSummary {
    pub scraped: usize,
    pub missing: usize,
    pub failed: usize,
}

/// What a listing's detail page yielded
enum DetailOutcome {
    Scraped,
    Missing(String),
    Failed(String),
}

/// Scrapes detail pages of listings in `not_scraped` status
///
/// # Arguments
///
/// * `client` - A client built with redirects disabled
/// * `storage` - The storage backend
/// * `limit` - Maximum listings to visit, all when `None`
pub async fn scrape_product_details<S>(
    client: &SiteClient,
    storage: &mut S,
    limit: Option<usize>,
) -> Result<DetailSummary, SweepError>
where
    S: Storage + ?Sized,
{
    let products = storage.get_products_by_status(ProductStatus::NotScraped, limit)?;
    let mut summary = DetailSummary::default();
    tracing::info!("Scraping details of {} listings", products.len());

    for product in &products {
        match scrape_one(client, storage, product).await? {
            DetailOutcome::Scraped => summary.scraped += 1,
            DetailOutcome::Missing(reason) => {
                tracing::info!("Listing {} is gone: {}", product.listing_id, reason);
                storage.update_product_status(product.id, ProductStatus::Missing, Some(&reason))?;
                summary.missing += 1;
            }
            DetailOutcome::Failed(reason) => {
                tracing::warn!("Failed to scrape listing {}: {}", product.listing_id, reason);
                storage.update_product_status(product.id, ProductStatus::Failed, Some(&reason))?;
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Details: {} scraped, {} missing, {} failed",
        summary.scraped,
        summary.missing,
        summary.failed
    );
    Ok(summary)
}

async fn scrape_one<S>(
    client: &SiteClient,
    storage: &mut S,
    product: &ProductRecord,
) -> Result<DetailOutcome, SweepError>
where
    S: Storage + ?Sized,
{
    let url = match Url::parse(&product.url) {
        Ok(url) => url,
        Err(e) => return Ok(DetailOutcome::Failed(format!("invalid url {}: {}", product.url, e))),
    };

    let page = match client.get(&url).await {
        Ok(page) => page,
        Err(e) if e.is_not_found() => return Ok(DetailOutcome::Missing(e.to_string())),
        Err(e) => return Ok(DetailOutcome::Failed(e.to_string())),
    };

    if page.is_redirect() {
        return Ok(DetailOutcome::Missing(format!("redirected (HTTP {})", page.status)));
    }

    match parse_product_details(&page.body, client.base_url()) {
        Some(details) => {
            storage.update_product_details(product.id, &details)?;
            tracing::debug!("Scraped listing {}", product.listing_id);
            Ok(DetailOutcome::Scraped)
        }
        None => Ok(DetailOutcome::Missing("no listing heading".to_string())),
    }
}
