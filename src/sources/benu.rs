// Benu category-page crawling: one request per target, no pagination.
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::fetcher::Fetcher;
use crate::model::Listing;
use crate::normalizer;
use crate::sources::{SourceAdapter, fetch_with_retry};

const ESHOP: &str = "Benu";

pub struct Benu {
    fetcher: Arc<dyn Fetcher>,
}

impl Benu {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// The pageSize/all variant returns the whole category in one page.
    fn category_url(target: &str) -> String {
        format!("https://www.benu.lt/{}?vars/pageSize/all", target.replace(' ', "-"))
    }

    fn parse_page(&self, html: &str, target: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let card_selector = Selector::parse("div.productsList__wrap > div > div").unwrap();
        let link_selector =
            Selector::parse("div > div.bnProductCard__top > a.bnProductCard__title").unwrap();
        let title_selector =
            Selector::parse("div > div.bnProductCard__top > a.bnProductCard__title > h3").unwrap();
        let price_selector = Selector::parse(
            "div > div.bnProductCard__bottom > div.bnProductCard__price > span > span > span",
        )
        .unwrap();

        let mut listings = Vec::new();
        for card in document.select(&card_selector) {
            // A card without a product link is skipped on its own; it must
            // not take the rest of the page down with it.
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

            let price_text = card
                .select(&price_selector)
                .next()
                .map(|node| node.text().collect::<String>())
                .unwrap_or_default();
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
impl SourceAdapter for Benu {
    fn name(&self) -> &'static str {
        ESHOP
    }

    async fn crawl(&self, targets: &[String]) -> Vec<Listing> {
        let mut collected: Vec<Listing> = Vec::new();
        for target in targets {
            let url = Self::category_url(target);
            info!("Getting url: {}", url);
            let Some(html) = fetch_with_retry(self.fetcher.as_ref(), &url).await else {
                warn!("Abandoning {:?} on {}", target, ESHOP);
                continue;
            };
            collected.extend(self.parse_page(&html, target));
            collected = normalizer::dedup(collected);
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testutil::CannedFetcher;

    fn card(link: Option<(&str, &str)>, price: &str) -> String {
        let top = match link {
            Some((title, href)) => format!(
                "<div class=\"bnProductCard__top\"><a class=\"bnProductCard__title\" href=\"{}\"><h3>{}</h3></a></div>",
                href, title
            ),
            None => "<div class=\"bnProductCard__top\"></div>".to_string(),
        };
        format!(
            concat!(
                "<div><div>",
                "{top}",
                "<div class=\"bnProductCard__bottom\">",
                "<div class=\"bnProductCard__price \"><span><span><span>{price}</span></span></span></div>",
                "</div></div></div>"
            ),
            top = top,
            price = price,
        )
    }

    fn page(cards: &[String]) -> String {
        format!(
            "<div class=\"productsList__wrap\"><div>{}</div></div>",
            cards.concat()
        )
    }

    #[tokio::test]
    async fn extracts_cards_and_canonicalizes_manufacturer() {
        let html = page(&[card(Some(("Thermal Water", "/thermal")), "9,99 €")]);
        let fetcher = Arc::new(CannedFetcher::new(vec![(
            Benu::category_url("la roche-posay"),
            html,
        )]));
        let adapter = Benu::new(fetcher);

        let listings = adapter.crawl(&["la roche-posay".to_string()]).await;

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Thermal Water");
        assert_eq!(listings[0].url, "/thermal");
        assert_eq!(listings[0].price, 9.99);
        assert_eq!(listings[0].manufacturer, "La roche-posay");
        assert_eq!(listings[0].eshop, "Benu");
    }

    #[tokio::test]
    async fn skips_cards_missing_url_or_price_individually() {
        let html = page(&[
            card(Some(("Good", "/good")), "5,00 €"),
            card(None, "4,00 €"),
            card(Some(("No Price", "/no-price")), ""),
            card(Some(("Also Good", "/also-good")), "2,50 €"),
        ]);
        let fetcher = Arc::new(CannedFetcher::new(vec![(
            Benu::category_url("uriage"),
            html,
        )]));
        let adapter = Benu::new(fetcher);

        let listings = adapter.crawl(&["uriage".to_string()]).await;

        let titles: Vec<&str> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Good", "Also Good"]);
    }

    #[tokio::test]
    async fn failed_target_does_not_abort_the_rest() {
        // "uriage" has no canned page; "apivita" does.
        let html = page(&[card(Some(("Balm", "/balm")), "6,60 €")]);
        let fetcher = Arc::new(CannedFetcher::new(vec![(
            Benu::category_url("apivita"),
            html,
        )]));
        let adapter = Benu::new(fetcher.clone());

        let listings = adapter
            .crawl(&["uriage".to_string(), "apivita".to_string()])
            .await;

        assert_eq!(fetcher.request_count(&Benu::category_url("uriage")), 10);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Balm");
    }
}
