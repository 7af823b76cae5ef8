//! End-to-end pipeline orchestration
//!
//! Runs the stages strictly in sequence — join, feature derivation, anomaly
//! labeling, two-phase training — each stage fully materializing its output
//! before the next begins. A run either completes all stages or returns the
//! first fatal error; there are no partial results.

use crate::anomaly::{flag_anomalies, AnomalyConfig};
use crate::data::RawTables;
use crate::error::Result;
use crate::features::{derive_features, FeatureRecord, FEATURE_NAMES};
use crate::geo::GeoIndex;
use crate::join::join_tables;
use crate::training::{train_two_phase, GradientBoostedRegressor, TwoPhaseConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One seed and one set of knobs for a whole run. The seed reaches every
/// randomized step: the outlier model, the train/test split, and both fits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seed shared by all randomized steps
    pub seed: u64,
    /// Expected anomaly fraction
    pub contamination: f64,
    /// Isolation trees
    pub anomaly_trees: usize,
    /// Round cap for the evaluation fit
    pub max_rounds: usize,
    /// Learning rate for both fits
    pub learning_rate: f64,
    /// Tree depth for both fits
    pub max_depth: usize,
    /// Early-stopping patience
    pub early_stopping_rounds: usize,
    /// Held-out fraction
    pub test_fraction: f64,
    /// Absolute-error threshold (days) for business accuracy
    pub business_threshold_days: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            contamination: 0.01,
            anomaly_trees: 100,
            max_rounds: 1000,
            learning_rate: 0.05,
            max_depth: 6,
            early_stopping_rounds: 50,
            test_fraction: 0.2,
            business_threshold_days: 3.0,
        }
    }
}

/// Everything a consumer needs after a run: the scored record set, the
/// served model, and the quality numbers from the evaluation phase.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Feature records with anomaly labels and predictions
    pub records: Vec<FeatureRecord>,
    /// The served (Phase-2) model
    pub model: GradientBoostedRegressor,
    /// Ordered feature names: the positional contract for inference
    pub feature_names: Vec<String>,
    /// Held-out R² from the evaluation phase
    pub heldout_r2: f64,
    /// Held-out MAE (days) from the evaluation phase
    pub heldout_mae: f64,
    /// Boosting rounds discovered by early stopping
    pub rounds_used: usize,
    /// Importances aligned with `feature_names`
    pub feature_importances: Vec<f64>,
    /// Records flagged anomalous
    pub n_anomalies: usize,
    /// Fraction of records with |prediction error| below the threshold
    pub business_accuracy: f64,
}

/// The batch pipeline: raw tables in, trained artifact and scored records
/// out.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Execute all stages on one set of raw tables.
    pub fn run(&self, tables: &RawTables) -> Result<PipelineReport> {
        info!("pipeline start: {} raw rows", tables.total_rows());

        // Stage 2: geo reduction and joins.
        let geo = GeoIndex::from_samples(&tables.locations);
        info!("geo index: {} postal prefixes", geo.len());
        let joined = join_tables(tables, &geo);

        // Stage 3: feature derivation behind the completeness gate.
        let mut records = derive_features(&joined);

        // Stage 4: anomaly labeling.
        let anomaly_config = AnomalyConfig {
            contamination: self.config.contamination,
            n_estimators: self.config.anomaly_trees,
            seed: self.config.seed,
        };
        let n_anomalies = flag_anomalies(&mut records, &anomaly_config)?;

        // Stage 5: two-phase training and whole-table prediction.
        let trainer_config = TwoPhaseConfig {
            max_rounds: self.config.max_rounds,
            learning_rate: self.config.learning_rate,
            max_depth: self.config.max_depth,
            early_stopping_rounds: self.config.early_stopping_rounds,
            test_fraction: self.config.test_fraction,
            seed: self.config.seed,
        };
        let outcome = train_two_phase(&mut records, &trainer_config)?;

        let business_accuracy =
            business_accuracy(&records, self.config.business_threshold_days);

        info!(
            "pipeline done: {} records, {} anomalies, R² {:.4}, MAE {:.2}, business accuracy {:.1}%",
            records.len(),
            n_anomalies,
            outcome.heldout_r2,
            outcome.heldout_mae,
            business_accuracy * 100.0
        );

        Ok(PipelineReport {
            records,
            model: outcome.model,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            heldout_r2: outcome.heldout_r2,
            heldout_mae: outcome.heldout_mae,
            rounds_used: outcome.rounds_used,
            feature_importances: outcome.feature_importances,
            n_anomalies,
            business_accuracy,
        })
    }
}

/// Fraction of records whose absolute prediction error is below
/// `threshold_days`. Records without a prediction count as misses.
fn business_accuracy(records: &[FeatureRecord], threshold_days: f64) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let hits = records
        .iter()
        .filter(|r| {
            r.prediction_error
                .map(|e| e.abs() < threshold_days)
                .unwrap_or(false)
        })
        .count();
    hits as f64 / records.len() as f64
}
