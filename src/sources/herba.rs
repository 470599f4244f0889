// Herba catalog-search crawling. The result grid is extracted column-wise:
// title, url and price node lists are zipped positionally.
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::fetcher::Fetcher;
use crate::model::Listing;
use crate::normalizer;
use crate::sources::{SourceAdapter, fetch_with_retry, own_text};

const ESHOP: &str = "Herba";

/// A full result page; a shorter page means the last page was reached.
const FULL_PAGE: usize = 24;

pub struct Herba {
    fetcher: Arc<dyn Fetcher>,
}

impl Herba {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    fn search_url(target: &str, page: u32) -> String {
        format!(
            "https://www.herba.lt/catalogsearch/result/index/?p={}&q={}",
            page, target
        )
    }

    fn parse_page(&self, html: &str, target: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let title_selector = Selector::parse("h4.product-name > a").unwrap();
        // Sale items carry the price in the product-price span itself;
        // regular items wrap it in a child span. Sidebar widgets repeat the
        // same ids with a "side" marker and are excluded from both.
        let sale_selector = Selector::parse(
            r#"span[id*="product-price"]:not([id*="side"]):not(.regular-price)"#,
        )
        .unwrap();
        let regular_selector = Selector::parse(
            r#"span.regular-price[id*="product-price"]:not([id*="side"]) > span"#,
        )
        .unwrap();

        let titles: Vec<String> = document
            .select(&title_selector)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .collect();
        let urls: Vec<String> = document
            .select(&title_selector)
            .filter_map(|a| a.value().attr("href").map(str::to_string))
            .collect();

        let mut price_texts: Vec<String> = document
            .select(&sale_selector)
            .map(|node| own_text(&node))
            .collect();
        price_texts.extend(
            document
                .select(&regular_selector)
                .map(|node| node.text().collect::<String>()),
        );
        let prices: Vec<f64> = price_texts
            .iter()
            .filter_map(|text| normalizer::normalize_price(text).ok())
            .collect();

        if titles.len() != prices.len() || titles.len() != urls.len() {
            warn!(
                "Column mismatch on {}: {} titles, {} urls, {} prices",
                ESHOP,
                titles.len(),
                urls.len(),
                prices.len()
            );
        }

        titles
            .into_iter()
            .zip(urls)
            .zip(prices)
            .map(|((title, url), price)| Listing {
                title,
                manufacturer: normalizer::capitalize(target),
                eshop: ESHOP.to_string(),
                url,
                price,
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for Herba {
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
                if page_len < FULL_PAGE || added == 0 {
                    break;
                }
            }
        }
        collected
    }
}
