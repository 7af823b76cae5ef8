//! Denormalizing join engine
//!
//! Collapses the six raw tables into one row per (order, item) pair. Join
//! semantics are load-bearing and deliberately asymmetric:
//! - orders, products, customers, sellers join **inner** — an item whose
//!   order, product, customer, or seller is missing is incomplete source
//!   data and is dropped without error;
//! - coordinates join **left** against the reduced [`GeoIndex`] — a missing
//!   geo match keeps the row and leaves the coordinates unresolved.

use crate::data::RawTables;
use crate::geo::GeoIndex;
use std::collections::HashMap;
use tracing::info;

/// One denormalized row: an order item with its order, product, customer,
/// seller, and best-effort coordinates attached.
#[derive(Debug, Clone)]
pub struct JoinedOrder {
    pub order_id: String,
    pub order_status: String,
    pub purchase_timestamp: Option<String>,
    pub approved_timestamp: Option<String>,
    pub delivered_timestamp: Option<String>,
    pub freight_value: f64,
    pub product_weight_g: Option<f64>,
    pub product_length_cm: Option<f64>,
    pub product_height_cm: Option<f64>,
    pub product_width_cm: Option<f64>,
    pub customer_zip_code_prefix: u32,
    pub seller_zip_code_prefix: u32,
    pub customer_coords: Option<(f64, f64)>,
    pub seller_coords: Option<(f64, f64)>,
}

/// Index rows of a table by a key column.
fn index_by<'a, T, K, F>(rows: &'a [T], key: F) -> HashMap<K, &'a T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&'a T) -> K,
{
    rows.iter().map(|row| (key(row), row)).collect()
}

/// Join all six tables into denormalized rows, one per (order, item) pair
/// that has a matching order, product, customer, and seller.
pub fn join_tables(tables: &RawTables, geo: &GeoIndex) -> Vec<JoinedOrder> {
    let orders = index_by(&tables.orders, |o| o.order_id.as_str());
    let products = index_by(&tables.products, |p| p.product_id.as_str());
    let customers = index_by(&tables.customers, |c| c.customer_id.as_str());
    let sellers = index_by(&tables.sellers, |s| s.seller_id.as_str());

    let mut joined = Vec::with_capacity(tables.items.len());
    for item in &tables.items {
        // Inner joins: any miss drops the item.
        let Some(order) = orders.get(item.order_id.as_str()) else {
            continue;
        };
        let Some(product) = products.get(item.product_id.as_str()) else {
            continue;
        };
        let Some(customer) = customers.get(order.customer_id.as_str()) else {
            continue;
        };
        let Some(seller) = sellers.get(item.seller_id.as_str()) else {
            continue;
        };

        // Left joins: the same reduced geo table resolved twice, once per
        // endpoint. Misses keep the row.
        let customer_coords = geo.resolve(customer.customer_zip_code_prefix);
        let seller_coords = geo.resolve(seller.seller_zip_code_prefix);

        joined.push(JoinedOrder {
            order_id: order.order_id.clone(),
            order_status: order.order_status.clone(),
            purchase_timestamp: order.order_purchase_timestamp.clone(),
            approved_timestamp: order.order_approved_at.clone(),
            delivered_timestamp: order.order_delivered_customer_date.clone(),
            freight_value: item.freight_value,
            product_weight_g: product.product_weight_g,
            product_length_cm: product.product_length_cm,
            product_height_cm: product.product_height_cm,
            product_width_cm: product.product_width_cm,
            customer_zip_code_prefix: customer.customer_zip_code_prefix,
            seller_zip_code_prefix: seller.seller_zip_code_prefix,
            customer_coords,
            seller_coords,
        });
    }

    info!(
        "joined {} of {} order items ({} dropped by inner joins)",
        joined.len(),
        tables.items.len(),
        tables.items.len() - joined.len()
    );
    joined
}
