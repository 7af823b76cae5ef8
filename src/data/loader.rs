//! CSV loading for the six raw tables
//!
//! Tables are read from a single dataset directory using the canonical file
//! names. Files are decoded as UTF-8 first; on failure the bytes are
//! re-decoded as Latin-1 (the source data ships a few tables in that
//! encoding) before the load is declared fatal.

use crate::data::{Customer, GeoSample, Order, OrderItem, Product, RawTables, Seller};
use crate::error::{PrazoError, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ORDERS_FILE: &str = "olist_orders_dataset.csv";
const ITEMS_FILE: &str = "olist_order_items_dataset.csv";
const PRODUCTS_FILE: &str = "olist_products_dataset.csv";
const CUSTOMERS_FILE: &str = "olist_customers_dataset.csv";
const SELLERS_FILE: &str = "olist_sellers_dataset.csv";
const LOCATIONS_FILE: &str = "olist_geolocation_dataset.csv";

/// Loads the six raw tables from a dataset directory.
pub struct TableLoader {
    dir: PathBuf,
}

impl TableLoader {
    /// Create a loader rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load all six tables.
    pub fn load(&self) -> Result<RawTables> {
        info!("loading raw tables from {}", self.dir.display());

        let tables = RawTables {
            orders: self.load_table(ORDERS_FILE)?,
            items: self.load_table(ITEMS_FILE)?,
            products: self.load_table(PRODUCTS_FILE)?,
            customers: self.load_table(CUSTOMERS_FILE)?,
            sellers: self.load_table(SELLERS_FILE)?,
            locations: self.load_table(LOCATIONS_FILE)?,
        };

        info!(
            "loaded {} rows across six tables ({} orders, {} items)",
            tables.total_rows(),
            tables.orders.len(),
            tables.items.len()
        );
        Ok(tables)
    }

    fn load_table<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file_name);
        let bytes = fs::read(&path)
            .map_err(|e| PrazoError::DataError(format!("cannot read {}: {e}", path.display())))?;
        let text = decode_with_fallback(bytes, file_name)?;
        let rows = parse_csv(&text)?;
        debug!("{file_name}: {} rows", rows.len());
        Ok(rows)
    }
}

/// Decode `bytes` as UTF-8, falling back to Latin-1. Latin-1 decoding cannot
/// fail: every byte maps to the Unicode scalar of the same value.
fn decode_with_fallback(bytes: Vec<u8>, file_name: &str) -> Result<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            debug!("{file_name}: not valid UTF-8, retrying as Latin-1");
            let bytes = err.into_bytes();
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
    }
}

/// Parse headered CSV text into typed rows. Columns are matched by header
/// name; extra columns are ignored, absent optional fields become `None`.
fn parse_csv<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &[u8]) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(content).unwrap();
    }

    fn write_minimal_dataset(dir: &Path) {
        write_file(
            dir,
            ORDERS_FILE,
            b"order_id,customer_id,order_status,order_purchase_timestamp,order_approved_at,order_delivered_customer_date\n\
              o1,c1,delivered,2017-10-02 10:56:33,2017-10-02 11:07:15,2017-10-10 21:25:13\n",
        );
        write_file(
            dir,
            ITEMS_FILE,
            b"order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value\n\
              o1,1,p1,s1,2017-10-06 11:07:15,58.9,13.29\n",
        );
        write_file(
            dir,
            PRODUCTS_FILE,
            b"product_id,product_category_name,product_weight_g,product_length_cm,product_height_cm,product_width_cm\n\
              p1,perfumaria,225,16,10,14\n",
        );
        write_file(
            dir,
            CUSTOMERS_FILE,
            b"customer_id,customer_unique_id,customer_zip_code_prefix,customer_city,customer_state\n\
              c1,cu1,14409,franca,SP\n",
        );
        write_file(
            dir,
            SELLERS_FILE,
            b"seller_id,seller_zip_code_prefix,seller_city,seller_state\n\
              s1,13023,campinas,SP\n",
        );
        write_file(
            dir,
            LOCATIONS_FILE,
            b"geolocation_zip_code_prefix,geolocation_lat,geolocation_lng,geolocation_city,geolocation_state\n\
              14409,-20.5,-47.4,franca,SP\n\
              13023,-22.9,-47.0,campinas,SP\n",
        );
    }

    #[test]
    fn test_load_minimal_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_dataset(dir.path());

        let tables = TableLoader::new(dir.path()).load().unwrap();

        assert_eq!(tables.orders.len(), 1);
        assert_eq!(tables.items.len(), 1);
        assert_eq!(tables.products.len(), 1);
        assert_eq!(tables.customers.len(), 1);
        assert_eq!(tables.sellers.len(), 1);
        assert_eq!(tables.locations.len(), 2);

        let product = &tables.products[0];
        assert_eq!(product.product_weight_g, Some(225.0));
        assert_eq!(tables.customers[0].customer_zip_code_prefix, 14409);
    }

    #[test]
    fn test_missing_measures_become_none() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_dataset(dir.path());
        write_file(
            dir.path(),
            PRODUCTS_FILE,
            b"product_id,product_weight_g,product_length_cm,product_height_cm,product_width_cm\n\
              p1,300,20,,15\n",
        );

        let tables = TableLoader::new(dir.path()).load().unwrap();
        let product = &tables.products[0];
        assert_eq!(product.product_height_cm, None);
        assert_eq!(product.product_length_cm, Some(20.0));
    }

    #[test]
    fn test_latin1_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_dataset(dir.path());
        // "são paulo" in Latin-1: 0xE3 is invalid as UTF-8.
        let mut content: Vec<u8> =
            b"seller_id,seller_zip_code_prefix,seller_city\ns1,13023,s".to_vec();
        content.push(0xE3);
        content.extend_from_slice(b"o paulo\n");
        write_file(dir.path(), SELLERS_FILE, &content);

        let tables = TableLoader::new(dir.path()).load().unwrap();
        assert_eq!(tables.sellers.len(), 1);
        assert_eq!(tables.sellers[0].seller_zip_code_prefix, 13023);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_dataset(dir.path());
        fs::remove_file(dir.path().join(ORDERS_FILE)).unwrap();

        let result = TableLoader::new(dir.path()).load();
        assert!(matches!(result, Err(PrazoError::DataError(_))));
    }
}
