use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

use pricewatch::analogs::AnalogResolver;
use pricewatch::config::{AppConfig, load_config};
use pricewatch::fetcher::{Fetcher, HttpFetcher};
use pricewatch::pipeline::{ConfiguredSource, run_ingestion};
use pricewatch::sources::build_adapter;
use pricewatch::storage::SqliteStorage;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config: AppConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    let storage = match SqliteStorage::new(&config.db_path) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    let fetcher: Arc<dyn Fetcher> = match HttpFetcher::new(&config.user_agent) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let mut sources: Vec<ConfiguredSource> = Vec::new();
    for source in &config.sources {
        match build_adapter(&source.name, fetcher.clone()) {
            Some(adapter) => sources.push((adapter, source.targets.clone())),
            None => warn!("No adapter for configured source {:?}", source.name),
        }
    }
    if sources.is_empty() {
        error!("No usable sources configured");
        return;
    }

    let resolver = AnalogResolver::new(storage.clone());

    loop {
        info!("Starting ingestion pass ({} sources)...", sources.len());
        let summary = run_ingestion(&sources, storage.clone()).await;
        for (source, ok) in &summary.sources {
            if *ok {
                info!("Source {}: ok", source);
            } else {
                warn!("Source {}: failed", source);
            }
        }

        match storage.lock().await.list_products() {
            Ok(products) => info!("Tracking {} products", products.len()),
            Err(e) => warn!("Product report failed: {}", e),
        }
        match resolver.list_links().await {
            Ok(links) => {
                for link in links {
                    info!(
                        "Analog {}: {} {} vs {} {} -> diff {:?}",
                        link.id,
                        link.eshop_1,
                        link.product_1,
                        link.eshop_2,
                        link.product_2,
                        link.price_diff
                    );
                }
            }
            Err(e) => warn!("Analog report failed: {}", e),
        }

        match config.check_interval_seconds {
            Some(secs) => {
                info!("Waiting {}s until the next pass...", secs);
                sleep(Duration::from_secs(secs)).await;
            }
            None => break,
        }
    }
}
