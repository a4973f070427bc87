//! Seller profile scraping

use crate::crawler::fetcher::SiteClient;
use crate::crawler::parser::parse_seller_profile;
use crate::storage::Storage;
use crate::SweepError;

/// Totals for one seller pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellerSummary {
    pub updated: usize,
    pub skipped: usize,
}

/// Fetches the profile page of every known seller and stores its fields
///
/// Profiles that cannot be fetched are skipped.
pub async fn scrape_seller_profiles<S>(client: &SiteClient, storage: &mut S) -> Result<SellerSummary, SweepError>
where
    S: Storage + ?Sized,
{
    let seller_ids = storage.list_seller_ids()?;
    let mut summary = SellerSummary::default();

    for seller_id in seller_ids {
        let mut url = client.url("index.php")?;
        url.query_pairs_mut()
            .append_pair("page", "profile")
            .append_pair("id", &seller_id.to_string());

        let page = match client.get(&url).await {
            Ok(page) if page.status == 200 => page,
            Ok(page) => {
                tracing::warn!("Skipping seller {}: HTTP {}", seller_id, page.status);
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping seller {}: {}", seller_id, e);
                summary.skipped += 1;
                continue;
            }
        };

        let profile = parse_seller_profile(&page.body, client.base_url());
        storage.update_seller_profile(seller_id, &profile)?;
        tracing::debug!("Updated seller {}", seller_id);
        summary.updated += 1;
    }

    tracing::info!(
        "Sellers: {} updated, {} skipped",
        summary.updated,
        summary.skipped
    );
    Ok(summary)
}
