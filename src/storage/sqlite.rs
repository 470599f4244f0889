use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::model::{
    AnalogEndpoints, Listing, PersistResult, PricePoint, ProductReport, StorageError,
};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database and creates the schema when missing.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open(db_path)?)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS manufacturer (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS eshop (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS product (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL UNIQUE,
                manufacturer_id INTEGER NOT NULL REFERENCES manufacturer(id),
                eshop_id INTEGER NOT NULL REFERENCES eshop(id)
            );

            CREATE TABLE IF NOT EXISTS store (
                product_id INTEGER NOT NULL REFERENCES product(id),
                price REAL NOT NULL,
                date TEXT NOT NULL,
                PRIMARY KEY (product_id, date)
            );

            CREATE TABLE IF NOT EXISTS analog (
                id INTEGER PRIMARY KEY,
                product_id_1 INTEGER NOT NULL REFERENCES product(id),
                product_id_2 INTEGER NOT NULL REFERENCES product(id)
            );
            ",
        )?;
        Ok(Self { conn })
    }

    /// Persists one source run in a single transaction: dimensions first,
    /// then product identities, then one price observation per listing.
    ///
    /// Identity rows are insert-or-ignore, so re-running a batch creates no
    /// new dimension or product rows. Observations always append under the
    /// run timestamp; price history is deliberately not deduplicated across
    /// runs. A listing whose dimension or product lookup misses inserts
    /// zero rows and is counted as skipped, never written with a dangling
    /// reference.
    pub fn persist_run(
        &mut self,
        listings: &[Listing],
        run_at: DateTime<Utc>,
    ) -> Result<PersistResult, StorageError> {
        let mut result = PersistResult::default();
        let run_at = run_at.to_rfc3339();
        let tx = self.conn.transaction()?;

        {
            let mut insert_manufacturer =
                tx.prepare("INSERT OR IGNORE INTO manufacturer (name) VALUES (?1)")?;
            for name in distinct(listings.iter().map(|l| l.manufacturer.as_str())) {
                result.new_manufacturers += insert_manufacturer.execute(params![name])?;
            }

            let mut insert_eshop = tx.prepare("INSERT OR IGNORE INTO eshop (name) VALUES (?1)")?;
            for name in distinct(listings.iter().map(|l| l.eshop.as_str())) {
                result.new_eshops += insert_eshop.execute(params![name])?;
            }

            let mut insert_product = tx.prepare(
                "INSERT OR IGNORE INTO product (name, url, manufacturer_id, eshop_id)
                 SELECT ?1, ?2, manufacturer.id, eshop.id
                 FROM manufacturer, eshop
                 WHERE manufacturer.name = ?3 AND eshop.name = ?4",
            )?;
            for listing in listings {
                result.new_products += insert_product.execute(params![
                    listing.title,
                    listing.url,
                    listing.manufacturer,
                    listing.eshop
                ])?;
            }

            let mut insert_observation = tx.prepare(
                "INSERT OR IGNORE INTO store (product_id, price, date)
                 SELECT id, ?2, ?3 FROM product WHERE name = ?1",
            )?;
            for listing in listings {
                let inserted =
                    insert_observation.execute(params![listing.title, listing.price, run_at])?;
                if inserted == 0 {
                    result.skipped += 1;
                } else {
                    result.new_observations += inserted;
                }
            }
        }

        tx.commit()?;
        Ok(result)
    }

    /// Looks up a product id by its unique display name.
    pub fn product_id_by_name(&self, name: &str) -> Result<Option<i64>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT id FROM product WHERE name = ?1")?;
        let mut rows = stmt.query(params![name])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Inserts or replaces one analog link under its externally assigned id.
    pub fn upsert_analog(
        &self,
        id: i64,
        product_id_1: i64,
        product_id_2: i64,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO analog (id, product_id_1, product_id_2) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE
             SET product_id_1 = excluded.product_id_1, product_id_2 = excluded.product_id_2",
            params![id, product_id_1, product_id_2],
        )?;
        Ok(())
    }

    /// Deletes links by id; absent ids are no-ops. Returns rows removed.
    pub fn delete_analogs(&self, ids: &[i64]) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("DELETE FROM analog WHERE id IN ({})", placeholders);
        let mut stmt = self.conn.prepare(&sql)?;
        Ok(stmt.execute(params_from_iter(ids.iter()))?)
    }

    /// All analog links with endpoint names, eshops and latest prices.
    /// The latest observation is the newest `date`; ties fall back to
    /// insertion order.
    pub fn list_analog_endpoints(&self) -> Result<Vec<AnalogEndpoints>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT analog.id,
                    p1.name, e1.name,
                    (SELECT price FROM store
                     WHERE product_id = p1.id ORDER BY date DESC, rowid DESC LIMIT 1),
                    p2.name, e2.name,
                    (SELECT price FROM store
                     WHERE product_id = p2.id ORDER BY date DESC, rowid DESC LIMIT 1)
             FROM analog
             INNER JOIN product AS p1 ON p1.id = analog.product_id_1
             INNER JOIN product AS p2 ON p2.id = analog.product_id_2
             INNER JOIN eshop AS e1 ON e1.id = p1.eshop_id
             INNER JOIN eshop AS e2 ON e2.id = p2.eshop_id
             ORDER BY analog.id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(AnalogEndpoints {
                id: row.get(0)?,
                product_1: row.get(1)?,
                eshop_1: row.get(2)?,
                last_price_1: row.get(3)?,
                product_2: row.get(4)?,
                eshop_2: row.get(5)?,
                last_price_2: row.get(6)?,
            })
        })?;

        let mut links = Vec::new();
        for link in rows {
            links.push(link?);
        }
        Ok(links)
    }

    /// Every product with its dimensions and latest observation, for the
    /// read-only product table.
    pub fn list_products(&self) -> Result<Vec<ProductReport>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT product.name, product.url, manufacturer.name, eshop.name,
                    (SELECT price FROM store
                     WHERE product_id = product.id ORDER BY date DESC, rowid DESC LIMIT 1),
                    (SELECT date FROM store
                     WHERE product_id = product.id ORDER BY date DESC, rowid DESC LIMIT 1)
             FROM product
             INNER JOIN manufacturer ON product.manufacturer_id = manufacturer.id
             INNER JOIN eshop ON product.eshop_id = eshop.id
             ORDER BY product.id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ProductReport {
                name: row.get(0)?,
                url: row.get(1)?,
                manufacturer: row.get(2)?,
                eshop: row.get(3)?,
                last_price: row.get(4)?,
                last_seen: parse_optional_date(row, 5)?,
            })
        })?;

        let mut products = Vec::new();
        for product in rows {
            products.push(product?);
        }
        Ok(products)
    }

    /// Observation rows filtered by eshop and manufacturer names, oldest
    /// first, for the price-history graphs. Either filter being empty
    /// yields no rows.
    pub fn price_history(
        &self,
        eshops: &[&str],
        manufacturers: &[&str],
    ) -> Result<Vec<PricePoint>, StorageError> {
        if eshops.is_empty() || manufacturers.is_empty() {
            return Ok(Vec::new());
        }

        let eshop_marks = vec!["?"; eshops.len()].join(",");
        let manufacturer_marks = vec!["?"; manufacturers.len()].join(",");
        let sql = format!(
            "SELECT product.name, manufacturer.name, eshop.name, store.price, store.date
             FROM store
             INNER JOIN product ON store.product_id = product.id
             INNER JOIN manufacturer ON product.manufacturer_id = manufacturer.id
             INNER JOIN eshop ON product.eshop_id = eshop.id
             WHERE eshop.name IN ({}) AND manufacturer.name IN ({})
             ORDER BY store.date ASC",
            eshop_marks, manufacturer_marks
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt.query_map(
            params_from_iter(eshops.iter().chain(manufacturers.iter())),
            |row| {
                Ok(PricePoint {
                    product: row.get(0)?,
                    manufacturer: row.get(1)?,
                    eshop: row.get(2)?,
                    price: row.get(3)?,
                    date: parse_date(row, 4)?,
                })
            },
        )?;

        let mut points = Vec::new();
        for point in rows {
            points.push(point?);
        }
        Ok(points)
    }
}

fn distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names.filter(|name| seen.insert(*name)).collect()
}

fn parse_date(row: &Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_optional_date(row: &Row, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => {
            let parsed = raw.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn listing(title: &str, manufacturer: &str, eshop: &str, url: &str, price: f64) -> Listing {
        Listing {
            title: title.to_string(),
            manufacturer: manufacturer.to_string(),
            eshop: eshop.to_string(),
            url: url.to_string(),
            price,
        }
    }

    fn run_at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn persist_creates_dimensions_products_and_observations() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let batch = vec![
            listing("Cream", "Uriage", "Benu", "/cream", 10.0),
            listing("Gel", "Uriage", "Herba", "/gel", 5.5),
        ];

        let result = storage.persist_run(&batch, run_at(1)).unwrap();

        assert_eq!(result.new_manufacturers, 1);
        assert_eq!(result.new_eshops, 2);
        assert_eq!(result.new_products, 2);
        assert_eq!(result.new_observations, 2);
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn persist_is_idempotent_for_identity_rows_but_appends_observations() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let batch = vec![
            listing("Cream", "Uriage", "Benu", "/cream", 10.0),
            listing("Gel", "Uriage", "Benu", "/gel", 5.5),
        ];

        storage.persist_run(&batch, run_at(1)).unwrap();
        let second = storage.persist_run(&batch, run_at(2)).unwrap();

        assert_eq!(second.new_manufacturers, 0);
        assert_eq!(second.new_eshops, 0);
        assert_eq!(second.new_products, 0);
        assert_eq!(second.new_observations, 2);

        let history = storage.price_history(&["Benu"], &["Uriage"]).unwrap();
        assert_eq!(history.len(), 4);
        assert!(history.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn renamed_product_never_updates_in_place() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .persist_run(
                &[listing("Old Name", "Uriage", "Benu", "/cream", 10.0)],
                run_at(1),
            )
            .unwrap();

        // Same URL under a new display name: the old row stays untouched
        // and no new row can claim the URL.
        let result = storage
            .persist_run(
                &[listing("New Name", "Uriage", "Benu", "/cream", 10.0)],
                run_at(2),
            )
            .unwrap();

        assert_eq!(result.new_products, 0);
        assert_eq!(result.skipped, 1);
        let products = storage.list_products().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Old Name");
    }

    #[test]
    fn same_title_twice_in_one_run_counts_one_observation() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        // Same product name under two URLs survives dedup but resolves to
        // one product row and one observation per run.
        let batch = vec![
            listing("Cream", "Uriage", "Benu", "/cream", 10.0),
            listing("Cream", "Uriage", "Benu", "/cream-promo", 9.0),
        ];

        let result = storage.persist_run(&batch, run_at(1)).unwrap();

        assert_eq!(result.new_products, 1);
        assert_eq!(result.new_observations, 1);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn list_products_reports_latest_observation() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let batch = vec![listing("Cream", "Uriage", "Benu", "/cream", 12.0)];
        storage.persist_run(&batch, run_at(1)).unwrap();
        let batch = vec![listing("Cream", "Uriage", "Benu", "/cream", 10.0)];
        storage.persist_run(&batch, run_at(2)).unwrap();

        let products = storage.list_products().unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].last_price, Some(10.0));
        assert_eq!(products[0].last_seen, Some(run_at(2)));
    }

    #[test]
    fn price_history_requires_both_filters() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let batch = vec![listing("Cream", "Uriage", "Benu", "/cream", 12.0)];
        storage.persist_run(&batch, run_at(1)).unwrap();

        assert!(storage.price_history(&[], &["Uriage"]).unwrap().is_empty());
        assert!(storage.price_history(&["Benu"], &[]).unwrap().is_empty());
        assert_eq!(
            storage.price_history(&["Benu"], &["Uriage"]).unwrap().len(),
            1
        );
    }
}
