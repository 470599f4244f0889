// Cross-retailer equivalence links. Links are curated by the management
// UI under externally assigned ids; this resolver validates endpoints
// against the product dimension and computes the latest-price delta on
// every read.
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::model::{AnalogComparison, AnalogEntry, StorageError};
use crate::storage::SqliteStorage;

pub struct AnalogResolver {
    storage: Arc<Mutex<SqliteStorage>>,
}

impl AnalogResolver {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self { storage }
    }

    /// Every link with the latest price on both ends and their delta.
    /// The delta is unavailable until both endpoints have observations.
    pub async fn list_links(&self) -> Result<Vec<AnalogComparison>, StorageError> {
        let storage = self.storage.lock().await;
        let links = storage.list_analog_endpoints()?;
        Ok(links
            .into_iter()
            .map(|link| {
                let price_diff = match (link.last_price_1, link.last_price_2) {
                    (Some(price_1), Some(price_2)) => Some(round2(price_1 - price_2)),
                    _ => None,
                };
                AnalogComparison {
                    id: link.id,
                    product_1: link.product_1,
                    eshop_1: link.eshop_1,
                    last_price_1: link.last_price_1,
                    product_2: link.product_2,
                    eshop_2: link.eshop_2,
                    last_price_2: link.last_price_2,
                    price_diff,
                }
            })
            .collect())
    }

    /// Upserts management-UI rows by id, replacing both endpoints when the
    /// id already exists. A row naming an unknown product is dropped, not
    /// an error. Returns how many rows were applied.
    pub async fn upsert_links(&self, rows: &[AnalogEntry]) -> Result<usize, StorageError> {
        let storage = self.storage.lock().await;
        let mut applied = 0;
        for row in rows {
            let Some(product_id_1) = storage.product_id_by_name(&row.product_1)? else {
                warn!("Dropping analog {}: unknown product {:?}", row.id, row.product_1);
                continue;
            };
            let Some(product_id_2) = storage.product_id_by_name(&row.product_2)? else {
                warn!("Dropping analog {}: unknown product {:?}", row.id, row.product_2);
                continue;
            };
            storage.upsert_analog(row.id, product_id_1, product_id_2)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Removes links by id; ids that no longer exist are no-ops.
    pub async fn delete_links(&self, ids: &[i64]) -> Result<usize, StorageError> {
        self.storage.lock().await.delete_analogs(ids)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
