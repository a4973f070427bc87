//! Search result pages as a [`PageFetcher`]

use crate::config::Config;
use crate::crawler::fetcher::SiteClient;
use crate::crawler::parser::parse_listing_page;
use crate::crawler::window::{
    FailurePolicy, PageFetcher, PageIndex, PageOutcome, ScanContext, WindowConfig, WindowScheduler,
};
use crate::crawler::FetchError;
use crate::SweepError;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Builds the search URL for one result page
///
/// `off` is the page index; the marketplace pages in steps of one, not of
/// `hw_num`.
pub fn search_url(
    base_url: &Url,
    context: &ScanContext,
    page: PageIndex,
    page_size: u32,
) -> Result<Url, url::ParseError> {
    let mut url = base_url.join("index.php")?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("page", "search")
            .append_pair("s_res", "GO")
            .append_pair("lite", "0");
        if let Some(category_id) = context.category_id {
            query.append_pair("cid", &category_id.to_string());
        }
        if let Some(days) = context.days {
            query.append_pair("hw_timeframe", &days.to_string());
        }
        query
            .append_pair("hw_num", &page_size.to_string())
            .append_pair("off", &page.to_string());
    }
    Ok(url)
}

/// Fetches and parses marketplace search result pages
pub struct HttpListingFetcher {
    client: SiteClient,
    page_size: u32,
}

impl HttpListingFetcher {
    pub fn new(client: SiteClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl PageFetcher for HttpListingFetcher {
    async fn fetch(&self, context: &ScanContext, page: PageIndex) -> PageOutcome {
        let url = match search_url(self.client.base_url(), context, page, self.page_size) {
            Ok(url) => url,
            Err(e) => {
                return PageOutcome::Failed(FetchError::Request {
                    url: self.client.base_url().to_string(),
                    message: e.to_string(),
                })
            }
        };

        match self.client.get(&url).await {
            Ok(fetched) => match parse_listing_page(&fetched.body, self.client.base_url()) {
                Some(products) => PageOutcome::Products(products),
                None => PageOutcome::End,
            },
            Err(e) if e.is_not_found() => {
                tracing::warn!("Result page not found, treating as end of results: {}", url);
                PageOutcome::End
            }
            Err(e) => {
                tracing::warn!("Failed to fetch page {} of {}: {}", page, context, e);
                PageOutcome::Failed(e)
            }
        }
    }
}

/// Builds a scheduler over live search pages with the configured policy
pub fn listing_scheduler(
    config: &Config,
    max_workers: usize,
) -> Result<WindowScheduler<HttpListingFetcher>, SweepError> {
    let client = SiteClient::new(&config.site, true)?;
    let fetcher = HttpListingFetcher::new(client, config.scan.page_size);
    let window = WindowConfig::new(max_workers)
        .with_failure_policy(FailurePolicy::from_config(&config.scan))
        .with_probe_first_page(config.scan.probe_first_page);
    Ok(WindowScheduler::new(Arc::new(fetcher), window))
}
