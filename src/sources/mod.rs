// Per-retailer source adapters: URL construction, extraction rules,
// pagination and retry policy.
pub mod benu;
pub mod eurovaistine;
pub mod herba;

use std::sync::Arc;

use async_trait::async_trait;
use scraper::ElementRef;
use tracing::warn;

use crate::fetcher::Fetcher;
use crate::model::Listing;

/// Attempts per page before the target is abandoned.
const MAX_FETCH_ATTEMPTS: u32 = 10;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Also the eshop dimension name under which listings are stored.
    fn name(&self) -> &'static str;

    /// Crawls the configured targets and returns deduplicated listings.
    /// Failures are contained per page and per target; a crawl itself never
    /// aborts the run.
    async fn crawl(&self, targets: &[String]) -> Vec<Listing>;
}

/// Fetches one URL, retrying on failure up to the attempt limit.
/// Returns None once the attempts are exhausted so the caller can abandon
/// the target and move on.
pub(crate) async fn fetch_with_retry(fetcher: &dyn Fetcher, url: &str) -> Option<String> {
    for attempt in 1..=MAX_FETCH_ATTEMPTS {
        match fetcher.fetch(url).await {
            Ok(html) => return Some(html),
            Err(e) => warn!(
                "Fetch attempt {}/{} failed: {}",
                attempt, MAX_FETCH_ATTEMPTS, e
            ),
        }
    }
    None
}

/// Text directly under an element, without descending into child elements.
/// Distinguishes a current price from a struck-through child node.
pub(crate) fn own_text(element: &ElementRef) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| &**text)
        .collect()
}

/// Maps a configured source name to its adapter.
pub fn build_adapter(name: &str, fetcher: Arc<dyn Fetcher>) -> Option<Box<dyn SourceAdapter>> {
    match name {
        "Eurovaistine" => Some(Box::new(eurovaistine::Eurovaistine::new(fetcher))),
        "Benu" => Some(Box::new(benu::Benu::new(fetcher))),
        "Herba" => Some(Box::new(herba::Herba::new(fetcher))),
        _ => None,
    }
}
