//! Unsupervised anomaly labeling
//!
//! Flags deliveries that look atypical in the space of outcome plus
//! physical/route difficulty (delivery time, distance, weight, volume,
//! freight). There is no ground truth: the contamination rate is a prior
//! assumption, not a learned quantity.

mod isolation_forest;

pub use isolation_forest::{IsolationForest, IsolationTree};

use crate::error::{PrazoError, Result};
use crate::features::{FeatureRecord, ANOMALY_FEATURE_NAMES};
use crate::preprocessing::StandardScaler;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Anomaly detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Anomaly scores (higher = more anomalous)
    pub scores: Array1<f64>,
    /// Binary labels (-1 = anomaly, 1 = normal)
    pub labels: Array1<i32>,
    /// Threshold used for classification
    pub threshold: f64,
    /// Number of anomalies detected
    pub n_anomalies: usize,
}

/// Trait for anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Fit the detector on training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Compute anomaly scores for new data
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict labels (-1 = anomaly, 1 = normal)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>>;

    /// Get detection results with scores and labels
    fn detect(&self, x: &Array2<f64>) -> Result<AnomalyResult> {
        let scores = self.score_samples(x)?;
        let labels = self.predict(x)?;
        let threshold = self.threshold();
        let n_anomalies = labels.iter().filter(|&&l| l == -1).count();

        Ok(AnomalyResult {
            scores,
            labels,
            threshold,
            n_anomalies,
        })
    }

    /// Get the decision threshold
    fn threshold(&self) -> f64;
}

/// Configuration for the anomaly-labeling stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Expected fraction of outliers.
    pub contamination: f64,
    /// Number of isolation trees.
    pub n_estimators: usize,
    /// Random seed.
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.01,
            n_estimators: 100,
            seed: 42,
        }
    }
}

/// Standardize the anomaly feature subset, fit an isolation forest, and set
/// `is_anomaly` on every record. Returns the number of records flagged.
pub fn flag_anomalies(records: &mut [FeatureRecord], config: &AnomalyConfig) -> Result<usize> {
    if records.is_empty() {
        return Err(PrazoError::ValidationError(
            "cannot fit anomaly detector on an empty feature table".to_string(),
        ));
    }

    let mut x = Array2::zeros((records.len(), ANOMALY_FEATURE_NAMES.len()));
    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.anomaly_vector().into_iter().enumerate() {
            x[[i, j]] = value;
        }
    }

    let mut scaler = StandardScaler::new();
    let x_scaled = scaler.fit_transform(&x)?;

    let mut forest = IsolationForest::new()
        .with_n_estimators(config.n_estimators)
        .with_contamination(config.contamination)
        .with_seed(config.seed);
    forest.fit(&x_scaled)?;

    let result = forest.detect(&x_scaled)?;
    for (record, &label) in records.iter_mut().zip(result.labels.iter()) {
        record.is_anomaly = label == -1;
    }

    info!("detected {} anomalies in {} records", result.n_anomalies, records.len());
    Ok(result.n_anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(delivery: f64, distance: f64, weight: f64, vol: f64, freight: f64) -> FeatureRecord {
        FeatureRecord {
            order_id: "o".to_string(),
            delivery_time_days: delivery,
            product_weight_g: weight,
            product_vol_cm3: vol,
            distance_km: distance,
            freight_value: freight,
            payment_lag_days: 0.0,
            is_weekend_order: false,
            customer_lat: -23.0,
            customer_lng: -46.0,
            seller_lat: -22.0,
            seller_lng: -47.0,
            purchase_month: 6,
            is_anomaly: false,
            predicted_days: None,
            prediction_error: None,
        }
    }

    #[test]
    fn test_flagging_marks_extreme_records() {
        // Smooth cluster plus two gross outliers.
        let mut records: Vec<FeatureRecord> = (0..200)
            .map(|i| {
                let t = (i % 20) as f64;
                record(5.0 + t * 0.1, 300.0 + t, 800.0 + t * 5.0, 4000.0 + t * 10.0, 20.0 + t * 0.2)
            })
            .collect();
        records.push(record(90.0, 4000.0, 30000.0, 90000.0, 400.0));
        records.push(record(60.0, 3500.0, 25000.0, 80000.0, 350.0));

        let n = flag_anomalies(&mut records, &AnomalyConfig::default()).unwrap();

        assert!(n > 0);
        let flagged: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_anomaly)
            .map(|(i, _)| i)
            .collect();
        // The gross outliers are among the flagged records.
        assert!(flagged.contains(&200) || flagged.contains(&201));
    }

    #[test]
    fn test_flagged_fraction_tracks_contamination() {
        let mut records: Vec<FeatureRecord> = (0..500)
            .map(|i| {
                let t = i as f64;
                record(
                    4.0 + (t * 0.7).sin() * 2.0 + t * 0.01,
                    200.0 + (t * 0.3).cos() * 150.0 + t * 0.5,
                    500.0 + (t * 1.1).sin() * 300.0 + t,
                    3000.0 + (t * 0.9).cos() * 2000.0 + t * 2.0,
                    15.0 + (t * 0.5).sin() * 10.0 + t * 0.01,
                )
            })
            .collect();

        let n = flag_anomalies(&mut records, &AnomalyConfig::default()).unwrap();
        let fraction = n as f64 / records.len() as f64;

        // Statistical prior, so only a wide-tolerance check.
        assert!(fraction > 0.0 && fraction < 0.1, "fraction = {fraction}");
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let mut records: Vec<FeatureRecord> = Vec::new();
        assert!(matches!(
            flag_anomalies(&mut records, &AnomalyConfig::default()),
            Err(PrazoError::ValidationError(_))
        ));
    }
}
