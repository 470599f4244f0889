// Eurovaistine search-result crawling and card extraction.
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::fetcher::Fetcher;
use crate::model::Listing;
use crate::normalizer;
use crate::sources::{SourceAdapter, fetch_with_retry, own_text};

const ESHOP: &str = "Eurovaistine";

/// A full result page; a shorter page means the last page was reached.
const FULL_PAGE: usize = 48;

pub struct Eurovaistine {
    fetcher: Arc<dyn Fetcher>,
}

impl Eurovaistine {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    fn search_url(target: &str, page: u32) -> String {
        format!(
            "https://www.eurovaistine.lt/paieska/rezultatai?q={}&page={}",
            target, page
        )
    }

    fn parse_page(&self, html: &str, target: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let card_selector = Selector::parse("div.product-card").unwrap();
        let link_selector = Selector::parse("a.product-card--link").unwrap();
        let title_selector = Selector::parse(
            "div.right-content > div.product-card--title-box > div > div.product-card--title",
        )
        .unwrap();
        let price_selector = Selector::parse("div.right-content > div.product-card--price").unwrap();
        let struck_selector = Selector::parse("s").unwrap();

        let mut listings = Vec::new();
        for card in document.select(&card_selector) {
            let Some(url) = card
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };
            let Some(title_node) = card.select(&title_selector).next() else {
                continue;
            };
            let title = title_node.text().collect::<String>().trim().to_string();

            let Some(price_node) = card.select(&price_selector).next() else {
                continue;
            };
            // Under a promotion the current price is empty and only the
            // struck-through old price is rendered; fall back to it.
            let mut price_text = own_text(&price_node);
            if price_text.trim().is_empty() {
                price_text = price_node
                    .select(&struck_selector)
                    .next()
                    .map(|s| s.text().collect::<String>())
                    .unwrap_or_default();
            }
            let price = match normalizer::normalize_price(&price_text) {
                Ok(price) => price,
                Err(e) => {
                    debug!("Skipping {:?}: {}", title, e);
                    continue;
                }
            };

            listings.push(Listing {
                title,
                manufacturer: normalizer::capitalize(target),
                eshop: ESHOP.to_string(),
                url: url.to_string(),
                price,
            });
        }
        listings
    }
}

#[async_trait]
impl SourceAdapter for Eurovaistine {
    fn name(&self) -> &'static str {
        ESHOP
    }

    async fn crawl(&self, targets: &[String]) -> Vec<Listing> {
        let mut collected: Vec<Listing> = Vec::new();
        for target in targets {
            let mut page = 1u32;
            loop {
                let url = Self::search_url(target, page);
                info!("Getting url: {}", url);
                let Some(html) = fetch_with_retry(self.fetcher.as_ref(), &url).await else {
                    warn!("Abandoning {:?} on {} after page {}", target, ESHOP, page);
                    break;
                };

                let page_listings = self.parse_page(&html, target);
                let page_len = page_listings.len();

                let before = collected.len();
                collected.extend(page_listings);
                collected = normalizer::dedup(collected);
                let added = collected.len() - before;

                page += 1;
                // Stop on a short page, or when a full page added nothing
                // unique: the site repeats its last page past the boundary,
                // so the card count alone is not a reliable signal.
                if page_len < FULL_PAGE || added == 0 {
                    break;
                }
            }
        }
        collected
    }
}
