//! Raw table records and ingestion
//!
//! The pipeline consumes six raw tables keyed by string identifiers and
//! postal prefixes. Records are typed structs deserialized by column name;
//! columns the pipeline does not use are ignored at parse time.

mod loader;

pub use loader::TableLoader;

use serde::{Deserialize, Serialize};

/// One row of the orders table. Timestamps stay raw strings here; parsing
/// happens during feature derivation so a bad date drops a row instead of a
/// whole table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub order_status: String,
    pub order_purchase_timestamp: Option<String>,
    pub order_approved_at: Option<String>,
    pub order_delivered_customer_date: Option<String>,
}

/// One row of the order-items table (one per item within an order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: String,
    pub product_id: String,
    pub seller_id: String,
    pub freight_value: f64,
}

/// One row of the products table. Physical measures are frequently absent
/// in the source data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub product_weight_g: Option<f64>,
    pub product_length_cm: Option<f64>,
    pub product_height_cm: Option<f64>,
    pub product_width_cm: Option<f64>,
}

/// One row of the customers table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub customer_zip_code_prefix: u32,
}

/// One row of the sellers table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seller {
    pub seller_id: String,
    pub seller_zip_code_prefix: u32,
}

/// One raw geolocation sample. A postal prefix appears many times with
/// slightly different coordinates; [`crate::geo::GeoIndex`] reduces them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoSample {
    pub geolocation_zip_code_prefix: u32,
    pub geolocation_lat: f64,
    pub geolocation_lng: f64,
}

/// The six raw tables consumed by one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub sellers: Vec<Seller>,
    pub locations: Vec<GeoSample>,
}

impl RawTables {
    /// Total row count across all six tables.
    pub fn total_rows(&self) -> usize {
        self.orders.len()
            + self.items.len()
            + self.products.len()
            + self.customers.len()
            + self.sellers.len()
            + self.locations.len()
    }
}
