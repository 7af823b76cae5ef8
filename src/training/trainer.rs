//! Two-phase trainer/evaluator
//!
//! Phase 1 fits on an 80/20 split of the non-anomalous records with early
//! stopping, producing the discovered round count and the held-out R²/MAE.
//! Phase 2 refits the same hyperparameters for exactly that round count on
//! all non-anomalous rows; that refit model is the one served. Reported
//! quality always comes from Phase 1 — the refit has nothing held out to
//! score against.

use crate::error::{PrazoError, Result};
use crate::features::{feature_matrix, target_vector, FeatureRecord, FEATURE_NAMES};
use crate::training::boosting::{BoostingConfig, GradientBoostedRegressor};
use crate::training::metrics::RegressionMetrics;
use crate::training::split::train_test_split;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Trainer configuration. The single seed drives the split and both fits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoPhaseConfig {
    /// Upper bound on boosting rounds for the evaluation fit
    pub max_rounds: usize,
    /// Learning rate shared by both phases
    pub learning_rate: f64,
    /// Tree depth shared by both phases
    pub max_depth: usize,
    /// Early-stopping patience for the evaluation fit
    pub early_stopping_rounds: usize,
    /// Held-out fraction for the evaluation fit
    pub test_fraction: f64,
    /// Seed for the split and both model fits
    pub seed: u64,
}

impl Default for TwoPhaseConfig {
    fn default() -> Self {
        Self {
            max_rounds: 1000,
            learning_rate: 0.05,
            max_depth: 6,
            early_stopping_rounds: 50,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Plain-data result of the two-phase protocol.
#[derive(Debug, Clone)]
pub struct TwoPhaseOutcome {
    /// The served model: refit on all non-anomalous rows
    pub model: GradientBoostedRegressor,
    /// R² on the Phase-1 held-out split
    pub heldout_r2: f64,
    /// Mean absolute error on the Phase-1 held-out split
    pub heldout_mae: f64,
    /// Round count discovered by early stopping in Phase 1
    pub rounds_used: usize,
    /// Importances aligned with [`FEATURE_NAMES`]
    pub feature_importances: Vec<f64>,
}

/// Run both phases and fill `predicted_days`/`prediction_error` on every
/// record — anomalies included, for display and inspection, even though
/// they were excluded from training.
pub fn train_two_phase(
    records: &mut [FeatureRecord],
    config: &TwoPhaseConfig,
) -> Result<TwoPhaseOutcome> {
    let clean: Vec<FeatureRecord> = records.iter().filter(|r| !r.is_anomaly).cloned().collect();
    if clean.is_empty() {
        return Err(PrazoError::TrainingError(
            "no non-anomalous records to train on".to_string(),
        ));
    }

    let x_clean = feature_matrix(&clean);
    let y_clean = target_vector(&clean);

    // Phase 1: evaluation fit with early stopping on the held-out split.
    let (train_idx, test_idx) = train_test_split(clean.len(), config.test_fraction, config.seed)?;
    let x_train = x_clean.select(Axis(0), &train_idx);
    let y_train = y_clean.select(Axis(0), &train_idx);
    let x_test = x_clean.select(Axis(0), &test_idx);
    let y_test = y_clean.select(Axis(0), &test_idx);

    info!(
        "phase 1: evaluating on {} train / {} held-out records",
        train_idx.len(),
        test_idx.len()
    );

    let eval_config = BoostingConfig {
        n_estimators: config.max_rounds,
        learning_rate: config.learning_rate,
        max_depth: config.max_depth,
        early_stopping_rounds: Some(config.early_stopping_rounds),
        random_state: Some(config.seed),
        ..Default::default()
    };
    let mut eval_model = GradientBoostedRegressor::new(eval_config.clone());
    eval_model.fit_eval(&x_train, &y_train, &x_test, &y_test)?;

    let rounds_used = eval_model.n_rounds();
    let y_pred = eval_model.predict(&x_test)?;
    let heldout = RegressionMetrics::compute(&y_test, &y_pred);

    info!(
        "phase 1 done: R² {:.4}, MAE {:.2} days, {} optimal rounds",
        heldout.r2, heldout.mae, rounds_used
    );

    // Phase 2: refit on 100% of the clean rows with the discovered round
    // count; no held-out monitoring.
    let final_config = BoostingConfig {
        n_estimators: rounds_used,
        early_stopping_rounds: None,
        ..eval_config
    };
    let mut model = GradientBoostedRegressor::new(final_config);
    model.fit(&x_clean, &y_clean)?;

    info!("phase 2 done: refit {} rounds on {} records", rounds_used, clean.len());

    // Predictions for the entire table, anomalies included.
    let x_all = feature_matrix(records);
    let predictions = model.predict(&x_all)?;
    for (record, &pred) in records.iter_mut().zip(predictions.iter()) {
        record.predicted_days = Some(pred);
        record.prediction_error = Some(record.delivery_time_days - pred);
    }

    let feature_importances = model
        .feature_importances()
        .unwrap_or_else(|| vec![0.0; FEATURE_NAMES.len()]);

    Ok(TwoPhaseOutcome {
        model,
        heldout_r2: heldout.r2,
        heldout_mae: heldout.mae,
        rounds_used,
        feature_importances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic synthetic records with a learnable distance-driven
    /// delivery time.
    fn synthetic_records(n: usize) -> Vec<FeatureRecord> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                let distance = 100.0 + (t * 13.7) % 2000.0;
                let weight = 200.0 + (t * 31.3) % 9000.0;
                let delivery = 2.0 + distance * 0.005 + weight * 0.0002 + (t * 0.7).sin();
                FeatureRecord {
                    order_id: format!("o{i}"),
                    delivery_time_days: delivery.round(),
                    product_weight_g: weight,
                    product_vol_cm3: 500.0 + (t * 97.0) % 20000.0,
                    distance_km: distance,
                    freight_value: 10.0 + (t * 7.9) % 80.0,
                    payment_lag_days: (i % 4) as f64,
                    is_weekend_order: i % 3 == 0,
                    customer_lat: -23.0 + (t * 0.01) % 5.0,
                    customer_lng: -46.0 - (t * 0.01) % 5.0,
                    seller_lat: -22.0 + (t * 0.007) % 4.0,
                    seller_lng: -47.0 - (t * 0.007) % 4.0,
                    purchase_month: (i % 12) as u32 + 1,
                    is_anomaly: false,
                    predicted_days: None,
                    prediction_error: None,
                }
            })
            .collect()
    }

    fn fast_config() -> TwoPhaseConfig {
        TwoPhaseConfig {
            max_rounds: 40,
            early_stopping_rounds: 8,
            max_depth: 3,
            learning_rate: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_phase_populates_every_record() {
        let mut records = synthetic_records(150);
        // Flag a few records; they must be excluded from training but still
        // receive predictions.
        for i in [3usize, 77, 149] {
            records[i].is_anomaly = true;
        }

        let outcome = train_two_phase(&mut records, &fast_config()).unwrap();

        assert!(records
            .iter()
            .all(|r| r.predicted_days.is_some() && r.prediction_error.is_some()));
        assert!(records[77].predicted_days.is_some());

        for record in &records {
            let err = record.prediction_error.unwrap();
            let pred = record.predicted_days.unwrap();
            assert!((record.delivery_time_days - pred - err).abs() < 1e-12);
        }

        assert!(outcome.rounds_used >= 1);
        assert!(outcome.rounds_used <= 40);
        assert!(outcome.heldout_mae >= 0.0);
        assert!(outcome.heldout_r2 <= 1.0);
    }

    #[test]
    fn test_importances_align_with_feature_names() {
        let mut records = synthetic_records(120);
        let outcome = train_two_phase(&mut records, &fast_config()).unwrap();

        assert_eq!(outcome.feature_importances.len(), FEATURE_NAMES.len());
        assert!(outcome.feature_importances.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_learnable_signal_gives_positive_r2() {
        let mut records = synthetic_records(300);
        let outcome = train_two_phase(&mut records, &fast_config()).unwrap();
        assert!(
            outcome.heldout_r2 > 0.3,
            "expected signal to be learned, R² = {}",
            outcome.heldout_r2
        );
    }

    #[test]
    fn test_all_anomalous_is_fatal() {
        let mut records = synthetic_records(50);
        for record in &mut records {
            record.is_anomaly = true;
        }
        assert!(matches!(
            train_two_phase(&mut records, &fast_config()),
            Err(PrazoError::TrainingError(_))
        ));
    }

    #[test]
    fn test_too_few_records_is_fatal() {
        let mut records = synthetic_records(1);
        assert!(train_two_phase(&mut records, &fast_config()).is_err());
    }

    #[test]
    fn test_same_seed_reproduces_outcome() {
        let mut a = synthetic_records(150);
        let mut b = synthetic_records(150);
        let config = fast_config();

        let out_a = train_two_phase(&mut a, &config).unwrap();
        let out_b = train_two_phase(&mut b, &config).unwrap();

        assert_eq!(out_a.rounds_used, out_b.rounds_used);
        assert_eq!(out_a.heldout_r2, out_b.heldout_r2);
        assert_eq!(
            a[0].predicted_days.unwrap(),
            b[0].predicted_days.unwrap()
        );
    }
}
