//! Feature derivation and the delivered-only completeness gate
//!
//! Consumes joined rows and produces [`FeatureRecord`]s. This stage is the
//! single correctness gate of the pipeline: a record survives only when the
//! order is delivered and target, weight, and distance are all present.

use crate::geo::haversine_km;
use crate::join::JoinedOrder;
use chrono::{Datelike, NaiveDateTime};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Timestamp format used by all three order date columns.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Order status that admits a row into the feature table.
const DELIVERED_STATUS: &str = "delivered";

/// Model feature columns, in training order. The order is a positional
/// contract: inference maps request fields to matrix columns through it.
pub const FEATURE_NAMES: [&str; 11] = [
    "product_weight_g",
    "product_vol_cm3",
    "distance_km",
    "customer_lat",
    "customer_lng",
    "seller_lat",
    "seller_lng",
    "payment_lag_days",
    "is_weekend_order",
    "freight_value",
    "purchase_month",
];

/// Columns scored by the anomaly detector: outcome plus physical/route
/// difficulty, deliberately narrower than the regression feature set.
pub const ANOMALY_FEATURE_NAMES: [&str; 5] = [
    "delivery_time_days",
    "distance_km",
    "product_weight_g",
    "product_vol_cm3",
    "freight_value",
];

/// One delivered order item with all derived features.
///
/// `is_anomaly` is false until the anomaly detector runs; the prediction
/// fields are `None` until the trainer fills them for every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub order_id: String,
    pub delivery_time_days: f64,
    pub product_weight_g: f64,
    pub product_vol_cm3: f64,
    pub distance_km: f64,
    pub freight_value: f64,
    pub payment_lag_days: f64,
    pub is_weekend_order: bool,
    pub customer_lat: f64,
    pub customer_lng: f64,
    pub seller_lat: f64,
    pub seller_lng: f64,
    pub purchase_month: u32,
    pub is_anomaly: bool,
    pub predicted_days: Option<f64>,
    pub prediction_error: Option<f64>,
}

impl FeatureRecord {
    /// Feature vector in [`FEATURE_NAMES`] order.
    pub fn feature_vector(&self) -> [f64; 11] {
        [
            self.product_weight_g,
            self.product_vol_cm3,
            self.distance_km,
            self.customer_lat,
            self.customer_lng,
            self.seller_lat,
            self.seller_lng,
            self.payment_lag_days,
            if self.is_weekend_order { 1.0 } else { 0.0 },
            self.freight_value,
            self.purchase_month as f64,
        ]
    }

    /// Anomaly-scoring vector in [`ANOMALY_FEATURE_NAMES`] order.
    pub fn anomaly_vector(&self) -> [f64; 5] {
        [
            self.delivery_time_days,
            self.distance_km,
            self.product_weight_g,
            self.product_vol_cm3,
            self.freight_value,
        ]
    }
}

/// Build the model design matrix for a set of records.
pub fn feature_matrix(records: &[FeatureRecord]) -> Array2<f64> {
    let mut matrix = Array2::zeros((records.len(), FEATURE_NAMES.len()));
    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.feature_vector().into_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }
    matrix
}

/// Target vector (delivery time in days) for a set of records.
pub fn target_vector(records: &[FeatureRecord]) -> Array1<f64> {
    records.iter().map(|r| r.delivery_time_days).collect()
}

/// Derive the feature table from joined rows, applying the gate.
pub fn derive_features(joined: &[JoinedOrder]) -> Vec<FeatureRecord> {
    let records: Vec<FeatureRecord> = joined.iter().filter_map(derive_record).collect();
    info!(
        "feature table: {} records kept of {} joined rows",
        records.len(),
        joined.len()
    );
    records
}

/// Derive one record, or `None` when the row fails the gate.
fn derive_record(row: &JoinedOrder) -> Option<FeatureRecord> {
    if row.order_status != DELIVERED_STATUS {
        return None;
    }

    let purchase = parse_timestamp(row.purchase_timestamp.as_deref())?;
    let delivered = parse_timestamp(row.delivered_timestamp.as_deref())?;
    let delivery_time_days = whole_days(purchase, delivered);

    let product_weight_g = row.product_weight_g?;

    // Both endpoints must resolve or the distance is undefined.
    let (customer_lat, customer_lng) = row.customer_coords?;
    let (seller_lat, seller_lng) = row.seller_coords?;
    let distance_km = haversine_km(customer_lat, customer_lng, seller_lat, seller_lng);

    // Missing dimensions zero out the product; inherited behavior, a known
    // conflation of "no volume" with "unknown".
    let product_vol_cm3 = row.product_length_cm.unwrap_or(0.0)
        * row.product_height_cm.unwrap_or(0.0)
        * row.product_width_cm.unwrap_or(0.0);

    // Missing approval reads as instant payment.
    let payment_lag_days = parse_timestamp(row.approved_timestamp.as_deref())
        .map_or(0.0, |approved| whole_days(purchase, approved));

    // 0 = Monday; >= 4 marks Friday through Sunday, a broadened definition
    // kept exactly as configured upstream.
    let weekday = purchase.weekday().num_days_from_monday();
    let is_weekend_order = weekday >= 4;

    Some(FeatureRecord {
        order_id: row.order_id.clone(),
        delivery_time_days,
        product_weight_g,
        product_vol_cm3,
        distance_km,
        freight_value: row.freight_value,
        payment_lag_days,
        is_weekend_order,
        customer_lat,
        customer_lng,
        seller_lat,
        seller_lng,
        purchase_month: purchase.month(),
        is_anomaly: false,
        predicted_days: None,
        prediction_error: None,
    })
}

fn parse_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw?, TIMESTAMP_FORMAT).ok()
}

/// Whole-day difference `to - from`.
fn whole_days(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    to.signed_duration_since(from).num_days() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined_row() -> JoinedOrder {
        JoinedOrder {
            order_id: "o1".to_string(),
            order_status: "delivered".to_string(),
            purchase_timestamp: Some("2017-10-02 10:56:33".to_string()),
            approved_timestamp: Some("2017-10-04 11:07:15".to_string()),
            delivered_timestamp: Some("2017-10-10 21:25:13".to_string()),
            freight_value: 13.29,
            product_weight_g: Some(225.0),
            product_length_cm: Some(16.0),
            product_height_cm: Some(10.0),
            product_width_cm: Some(14.0),
            customer_zip_code_prefix: 14409,
            seller_zip_code_prefix: 13023,
            customer_coords: Some((-20.5, -47.4)),
            seller_coords: Some((-22.9, -47.0)),
        }
    }

    #[test]
    fn test_basic_derivation() {
        let record = derive_record(&joined_row()).unwrap();

        assert_eq!(record.delivery_time_days, 8.0);
        assert_eq!(record.payment_lag_days, 2.0);
        assert_eq!(record.product_vol_cm3, 16.0 * 10.0 * 14.0);
        assert_eq!(record.purchase_month, 10);
        // 2017-10-02 is a Monday.
        assert!(!record.is_weekend_order);
        assert!(record.distance_km > 0.0);
        assert!(!record.is_anomaly);
        assert!(record.predicted_days.is_none());
    }

    #[test]
    fn test_non_delivered_status_is_dropped() {
        let mut row = joined_row();
        row.order_status = "shipped".to_string();
        assert!(derive_record(&row).is_none());
    }

    #[test]
    fn test_missing_delivery_timestamp_is_dropped() {
        let mut row = joined_row();
        row.delivered_timestamp = None;
        assert!(derive_record(&row).is_none());

        let mut row = joined_row();
        row.delivered_timestamp = Some("not a timestamp".to_string());
        assert!(derive_record(&row).is_none());
    }

    #[test]
    fn test_missing_weight_is_dropped() {
        let mut row = joined_row();
        row.product_weight_g = None;
        assert!(derive_record(&row).is_none());
    }

    #[test]
    fn test_missing_coordinates_are_dropped() {
        let mut row = joined_row();
        row.customer_coords = None;
        assert!(derive_record(&row).is_none());

        let mut row = joined_row();
        row.seller_coords = None;
        assert!(derive_record(&row).is_none());
    }

    #[test]
    fn test_missing_dimension_zeroes_volume() {
        let mut row = joined_row();
        row.product_height_cm = None;
        let record = derive_record(&row).unwrap();
        assert_eq!(record.product_vol_cm3, 0.0);
    }

    #[test]
    fn test_missing_approval_means_zero_lag() {
        let mut row = joined_row();
        row.approved_timestamp = None;
        let record = derive_record(&row).unwrap();
        assert_eq!(record.payment_lag_days, 0.0);
    }

    #[test]
    fn test_friday_counts_as_weekend() {
        let mut row = joined_row();
        // 2017-10-06 is a Friday.
        row.purchase_timestamp = Some("2017-10-06 09:00:00".to_string());
        let record = derive_record(&row).unwrap();
        assert!(record.is_weekend_order);

        // 2017-10-05 is a Thursday.
        row.purchase_timestamp = Some("2017-10-05 09:00:00".to_string());
        let record = derive_record(&row).unwrap();
        assert!(!record.is_weekend_order);
    }

    #[test]
    fn test_same_point_distance_is_zero() {
        let mut row = joined_row();
        row.customer_coords = Some((0.0, 0.0));
        row.seller_coords = Some((0.0, 0.0));
        let record = derive_record(&row).unwrap();
        assert!(record.distance_km.abs() < 1e-9);
    }

    #[test]
    fn test_feature_vector_matches_name_order() {
        let record = derive_record(&joined_row()).unwrap();
        let vector = record.feature_vector();

        assert_eq!(vector.len(), FEATURE_NAMES.len());
        assert_eq!(vector[0], record.product_weight_g);
        assert_eq!(vector[2], record.distance_km);
        assert_eq!(vector[8], 0.0); // Monday order, not weekend
        assert_eq!(vector[10], 10.0); // October
    }

    #[test]
    fn test_matrix_shapes() {
        let records = vec![
            derive_record(&joined_row()).unwrap(),
            derive_record(&joined_row()).unwrap(),
        ];
        let x = feature_matrix(&records);
        let y = target_vector(&records);

        assert_eq!(x.nrows(), 2);
        assert_eq!(x.ncols(), FEATURE_NAMES.len());
        assert_eq!(y.len(), 2);
    }
}
