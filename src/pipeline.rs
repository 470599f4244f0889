// One ingestion pass: crawl every configured source and persist each
// source's batch in its own transaction.
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::model::IngestionSummary;
use crate::sources::SourceAdapter;
use crate::storage::SqliteStorage;

/// An adapter paired with the targets configured for it.
pub type ConfiguredSource = (Box<dyn SourceAdapter>, Vec<String>);

/// Runs all sources concurrently. Each source commits independently, so
/// one source's failure never blocks or rolls back another's; the summary
/// reports which sources committed.
pub async fn run_ingestion(
    sources: &[ConfiguredSource],
    storage: Arc<Mutex<SqliteStorage>>,
) -> IngestionSummary {
    let tasks = sources.iter().map(|(adapter, targets)| {
        let storage = storage.clone();
        async move {
            let name = adapter.name().to_string();
            info!("Crawling source {}...", name);
            let listings = adapter.crawl(targets).await;
            info!("Source {} yielded {} unique listings", name, listings.len());

            let persisted = storage.lock().await.persist_run(&listings, Utc::now());
            match persisted {
                Ok(result) => {
                    info!(
                        "Source {}: {} new products, {} observations, {} skipped",
                        name, result.new_products, result.new_observations, result.skipped
                    );
                    (name, true)
                }
                Err(e) => {
                    warn!("Source {} failed to persist: {}", name, e);
                    (name, false)
                }
            }
        }
    });

    let mut summary = IngestionSummary::default();
    for (name, ok) in join_all(tasks).await {
        summary.sources.insert(name, ok);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::model::Listing;

    struct FixedSource {
        name: &'static str,
        listings: Vec<Listing>,
    }

    #[async_trait]
    impl SourceAdapter for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn crawl(&self, _targets: &[String]) -> Vec<Listing> {
            self.listings.clone()
        }
    }

    fn listing(title: &str, eshop: &str) -> Listing {
        Listing {
            title: title.to_string(),
            manufacturer: "Uriage".to_string(),
            eshop: eshop.to_string(),
            url: format!("/{}/{}", eshop, title),
            price: 4.0,
        }
    }

    #[tokio::test]
    async fn each_source_persists_and_reports_independently() {
        let storage = Arc::new(Mutex::new(SqliteStorage::open_in_memory().unwrap()));
        let sources: Vec<ConfiguredSource> = vec![
            (
                Box::new(FixedSource {
                    name: "Benu",
                    listings: vec![listing("Cream", "Benu")],
                }),
                vec![],
            ),
            (
                Box::new(FixedSource {
                    name: "Herba",
                    listings: vec![listing("Gel", "Herba")],
                }),
                vec![],
            ),
        ];

        let summary = run_ingestion(&sources, storage.clone()).await;

        assert!(summary.all_ok());
        assert_eq!(summary.sources.len(), 2);
        let products = storage.lock().await.list_products().unwrap();
        assert_eq!(products.len(), 2);
    }
}
