//! Feature standardization
//!
//! Z-score scaling used ahead of anomaly detection. A zero-variance column
//! cannot be standardized and is a fatal fit error rather than a silent
//! pass-through: a degenerate score space would corrupt the outlier model.

use crate::error::{PrazoError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Standard (z-score) scaler: (x - mean) / std per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            means: Vec::new(),
            stds: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit column means and standard deviations.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(PrazoError::PreprocessingError(
                "cannot fit scaler on empty matrix".to_string(),
            ));
        }

        let n = n_samples as f64;
        self.means.clear();
        self.stds.clear();

        for (j, column) in x.columns().into_iter().enumerate() {
            let mean = column.sum() / n;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            if std < 1e-12 {
                return Err(PrazoError::PreprocessingError(format!(
                    "column {j} has zero variance"
                )));
            }
            self.means.push(mean);
            self.stds.push(std);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform a matrix with the fitted parameters.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PrazoError::ModelNotFitted);
        }
        if x.ncols() != self.means.len() {
            return Err(PrazoError::ShapeError {
                expected: format!("{} columns", self.means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut scaled = x.clone();
        for (j, mut column) in scaled.columns_mut().into_iter().enumerate() {
            let mean = self.means[j];
            let std = self.stds[j];
            column.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(scaled)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}
