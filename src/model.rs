// Core structs: Listing, persistence/report rows, error taxonomy
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// One normalized listing produced by a source adapter within a crawl run.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub title: String,
    pub manufacturer: String,
    pub eshop: String,
    pub url: String,
    pub price: f64,
}

/// Row counts reported by one persisted source run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersistResult {
    pub new_manufacturers: usize,
    pub new_eshops: usize,
    pub new_products: usize,
    pub new_observations: usize,
    /// Listings that resolved no product row, or duplicated an observation
    /// already written in this run.
    pub skipped: usize,
}

/// Per-source outcome of one ingestion pass.
#[derive(Debug, Default)]
pub struct IngestionSummary {
    pub sources: HashMap<String, bool>,
}

impl IngestionSummary {
    pub fn all_ok(&self) -> bool {
        self.sources.values().all(|ok| *ok)
    }
}

/// Product row joined with its dimensions and latest observation.
#[derive(Debug, Clone)]
pub struct ProductReport {
    pub name: String,
    pub url: String,
    pub manufacturer: String,
    pub eshop: String,
    pub last_price: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// One observation row for price-history reporting.
#[derive(Debug, Clone)]
pub struct PricePoint {
    pub product: String,
    pub manufacturer: String,
    pub eshop: String,
    pub price: f64,
    pub date: DateTime<Utc>,
}

/// Editable analog row as the management UI hands it over. The id is
/// assigned by the UI, not by the database.
#[derive(Debug, Clone)]
pub struct AnalogEntry {
    pub id: i64,
    pub product_1: String,
    pub product_2: String,
}

/// One stored analog link with both endpoints resolved to display fields.
#[derive(Debug, Clone)]
pub struct AnalogEndpoints {
    pub id: i64,
    pub product_1: String,
    pub eshop_1: String,
    pub last_price_1: Option<f64>,
    pub product_2: String,
    pub eshop_2: String,
    pub last_price_2: Option<f64>,
}

/// Analog link with the latest-price delta computed on read.
#[derive(Debug, Clone)]
pub struct AnalogComparison {
    pub id: i64,
    pub product_1: String,
    pub eshop_1: String,
    pub last_price_1: Option<f64>,
    pub product_2: String,
    pub eshop_2: String,
    pub last_price_2: Option<f64>,
    pub price_diff: Option<f64>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a price: {0:?}")]
pub struct NormalizationError(pub String);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
