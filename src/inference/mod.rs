//! Prediction-service boundary
//!
//! Wraps the served model for single-record inference. The boundary owns
//! request plausibility checks: impossible values are rejected outright,
//! while values outside the training distribution's reliable envelope get
//! attached warnings instead — the estimate is still produced, it is just
//! flagged as less trustworthy.

use crate::error::{PrazoError, Result};
use crate::features::FEATURE_NAMES;
use crate::pipeline::PipelineReport;
use crate::training::GradientBoostedRegressor;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Reliable envelope of the training data; requests outside it predict with
/// degraded accuracy and carry warnings.
const DISTANCE_RELIABLE_KM: (f64, f64) = (50.0, 2500.0);
const WEIGHT_RELIABLE_G: (f64, f64) = (200.0, 15_000.0);
const VOLUME_RELIABLE_CM3: f64 = 100_000.0;

/// A single inference request: the model features for one parcel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub product_weight_g: f64,
    pub product_vol_cm3: f64,
    pub distance_km: f64,
    pub customer_lat: f64,
    pub customer_lng: f64,
    pub seller_lat: f64,
    pub seller_lng: f64,
    pub payment_lag_days: f64,
    pub is_weekend_order: bool,
    pub freight_value: f64,
    pub purchase_month: u32,
}

impl PredictionRequest {
    /// Reject impossible values. Plausible-but-extreme values pass and are
    /// handled by [`Self::out_of_range_warnings`].
    pub fn validate(&self) -> Result<()> {
        let numeric_fields = [
            ("product_weight_g", self.product_weight_g),
            ("product_vol_cm3", self.product_vol_cm3),
            ("distance_km", self.distance_km),
            ("customer_lat", self.customer_lat),
            ("customer_lng", self.customer_lng),
            ("seller_lat", self.seller_lat),
            ("seller_lng", self.seller_lng),
            ("payment_lag_days", self.payment_lag_days),
            ("freight_value", self.freight_value),
        ];
        for (name, value) in numeric_fields {
            if !value.is_finite() {
                return Err(PrazoError::ValidationError(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }

        let non_negative = [
            ("product_weight_g", self.product_weight_g),
            ("product_vol_cm3", self.product_vol_cm3),
            ("distance_km", self.distance_km),
            ("payment_lag_days", self.payment_lag_days),
            ("freight_value", self.freight_value),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(PrazoError::ValidationError(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }

        for (name, value) in [("customer_lat", self.customer_lat), ("seller_lat", self.seller_lat)] {
            if value.abs() > 90.0 {
                return Err(PrazoError::ValidationError(format!(
                    "{name} must be within [-90, 90], got {value}"
                )));
            }
        }
        for (name, value) in [("customer_lng", self.customer_lng), ("seller_lng", self.seller_lng)] {
            if value.abs() > 180.0 {
                return Err(PrazoError::ValidationError(format!(
                    "{name} must be within [-180, 180], got {value}"
                )));
            }
        }

        if !(1..=12).contains(&self.purchase_month) {
            return Err(PrazoError::ValidationError(format!(
                "purchase_month must be in 1..=12, got {}",
                self.purchase_month
            )));
        }

        Ok(())
    }

    /// Names of fields outside the reliable training envelope.
    pub fn out_of_range_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.distance_km < DISTANCE_RELIABLE_KM.0 || self.distance_km > DISTANCE_RELIABLE_KM.1 {
            warnings.push("distance_km".to_string());
        }
        if self.product_weight_g < WEIGHT_RELIABLE_G.0
            || self.product_weight_g > WEIGHT_RELIABLE_G.1
        {
            warnings.push("product_weight_g".to_string());
        }
        if self.product_vol_cm3 > VOLUME_RELIABLE_CM3 {
            warnings.push("product_vol_cm3".to_string());
        }

        warnings
    }

    /// Feature row in canonical [`FEATURE_NAMES`] order.
    fn feature_row(&self) -> [f64; 11] {
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
}

/// A served prediction with its quality context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_days: f64,
    /// Held-out R² of the evaluation fit
    pub heldout_r2: f64,
    /// Held-out mean absolute error, in days
    pub heldout_mae: f64,
    /// Fields outside the reliable training envelope
    pub warnings: Vec<String>,
}

/// Operational metrics for a health/status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub records: usize,
    pub r2_score: f64,
    pub mae: f64,
}

/// Read-only serving wrapper around the trained artifact. Cheap to clone
/// and safe to share across concurrent request handlers.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    model: GradientBoostedRegressor,
    feature_names: Vec<String>,
    heldout_r2: f64,
    heldout_mae: f64,
    n_records: usize,
}

impl PredictionEngine {
    /// Build the engine from a completed pipeline run.
    pub fn from_report(report: &PipelineReport) -> Self {
        Self {
            model: report.model.clone(),
            feature_names: report.feature_names.clone(),
            heldout_r2: report.heldout_r2,
            heldout_mae: report.heldout_mae,
            n_records: report.records.len(),
        }
    }

    /// Ordered feature names defining the positional input mapping.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Metrics snapshot for status reporting.
    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            records: self.n_records,
            r2_score: self.heldout_r2,
            mae: self.heldout_mae,
        }
    }

    /// Validate a request and produce an estimate with any out-of-range
    /// warnings attached.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        request.validate()?;

        let row = request.feature_row();
        let x = Array2::from_shape_vec((1, FEATURE_NAMES.len()), row.to_vec())
            .map_err(|e| PrazoError::InferenceError(e.to_string()))?;
        let predicted = self.model.predict(&x)?;

        Ok(Prediction {
            predicted_days: predicted[0],
            heldout_r2: self.heldout_r2,
            heldout_mae: self.heldout_mae,
            warnings: request.out_of_range_warnings(),
        })
    }
}
