//! Regression quality metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics for regressor evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared (coefficient of determination)
    pub r2: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute all metrics from true and predicted targets.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.sum() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_near_perfect_predictions() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred);

        assert!(metrics.r2 > 0.9);
        assert!(metrics.mae < 0.1);
        assert!((metrics.rmse * metrics.rmse - metrics.mse).abs() < 1e-12);
        assert_eq!(metrics.n_samples, 5);
    }

    #[test]
    fn test_mean_predictor_has_zero_r2() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![2.0, 2.0, 2.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred);
        assert!(metrics.r2.abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_yields_zero_r2() {
        let y_true = array![4.0, 4.0, 4.0];
        let y_pred = array![4.0, 4.0, 4.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred);
        assert_eq!(metrics.r2, 0.0);
        assert_eq!(metrics.mae, 0.0);
    }
}
