//! Fake fetcher shared by the scan driver tests

use crate::crawler::window::{PageFetcher, PageIndex, PageOutcome, ScanContext};
use crate::storage::ProductSummary;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves a fixed number of full pages per category
pub(crate) struct PagedFetcher {
    pub pages: HashMap<Option<i64>, PageIndex>,
    pub per_page: i64,
    pub requests: Mutex<Vec<ScanContext>>,
}

impl PagedFetcher {
    pub fn new(pages: impl IntoIterator<Item = (Option<i64>, PageIndex)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            per_page: 2,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for PagedFetcher {
    async fn fetch(&self, context: &ScanContext, page: PageIndex) -> PageOutcome {
        self.requests.lock().unwrap().push(context.clone());
        let pages = self.pages.get(&context.category_id).copied().unwrap_or(0);
        if page >= pages {
            return PageOutcome::End;
        }

        let base = context.category_id.unwrap_or(0) * 10_000 + page as i64 * 100;
        PageOutcome::Products(
            (0..self.per_page)
                .map(|i| ProductSummary {
                    listing_id: base + i,
                    name: format!("Listing {}", base + i),
                    url: format!("https://ibay.com.mv/listing-o{}.html", base + i),
                })
                .collect(),
        )
    }
}
