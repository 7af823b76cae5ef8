//! Gradient-boosted regression trees with second-order leaf weights
//!
//! Squared-error boosting in the XGBoost style:
//! - gradient/hessian of the loss drive tree construction
//! - regularized leaf weights: w* = −G / (H + λ)
//! - gain-based split scoring with a minimum-gain cutoff (γ)
//! - optional early stopping against a held-out evaluation set

use crate::error::{PrazoError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Boosting configuration. Defaults carry the production pipeline settings:
/// a generous round cap, a small learning rate, bounded depth, and early
/// stopping with a 50-round patience window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Upper bound on boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    /// Row subsample ratio per tree
    pub subsample: f64,
    /// Column subsample ratio per tree
    pub colsample_bytree: f64,
    /// Stop after this many rounds without held-out improvement
    pub early_stopping_rounds: Option<usize>,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 1000,
            learning_rate: 0.05,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            early_stopping_rounds: Some(50),
            random_state: Some(42),
        }
    }
}

/// A single regression tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum BoostNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<BoostNode>,
        right: Box<BoostNode>,
    },
}

impl BoostNode {
    fn predict(&self, sample: &ndarray::ArrayView1<f64>) -> f64 {
        match self {
            BoostNode::Leaf { weight } => *weight,
            BoostNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Build one tree with exact greedy split finding over the given rows and
/// candidate feature columns.
fn build_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &BoostingConfig,
) -> BoostNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();
    let leaf_weight = -g_sum / (h_sum + config.reg_lambda);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return BoostNode::Leaf { weight: leaf_weight };
    }

    // Each candidate feature scans its own sorted order in parallel.
    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return BoostNode::Leaf { weight: leaf_weight };
            }

            let left = build_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            BoostNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => BoostNode::Leaf { weight: leaf_weight },
    }
}

/// Best split for one feature via the exact greedy method: sort rows by the
/// feature, sweep prefix gradient/hessian sums, score with the gain formula
/// Gain = 0.5·[GL²/(HL+λ) + GR²/(HR+λ) − G²/(H+λ)].
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &BoostingConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();

    let lambda = config.reg_lambda;
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;

    for (pos, &idx) in sorted_indices.iter().enumerate() {
        g_left += grad[idx];
        h_left += hess[idx];

        // Identical neighboring feature values cannot be separated.
        if pos + 1 < sorted_indices.len() {
            let next_idx = sorted_indices[pos + 1];
            if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
                continue;
            }
        } else {
            break;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if gain > best_gain {
            best_gain = gain;
            let next_idx = sorted_indices[pos + 1];
            best_threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
        }
    }

    if best_gain > f64::NEG_INFINITY {
        Some((feature, best_threshold, best_gain))
    } else {
        None
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    let sample_size = ((n as f64) * ratio).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(sample_size.max(1));
    indices.sort_unstable();
    indices
}

/// Gradient-boosted regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    config: BoostingConfig,
    trees: Vec<BoostNode>,
    base_score: f64,
    n_features: usize,
}

impl GradientBoostedRegressor {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    /// Fit for exactly `n_estimators` rounds, no held-out monitoring.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_impl(x, y, None)
    }

    /// Fit with held-out monitoring and early stopping: training stops once
    /// the evaluation RMSE has not improved for the configured patience
    /// window, and the ensemble is truncated to the best round seen.
    pub fn fit_eval(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        x_eval: &Array2<f64>,
        y_eval: &Array1<f64>,
    ) -> Result<()> {
        if x_eval.nrows() == 0 {
            return Err(PrazoError::TrainingError(
                "evaluation set is empty".to_string(),
            ));
        }
        self.fit_impl(x, y, Some((x_eval, y_eval)))
    }

    fn fit_impl(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        eval: Option<(&Array2<f64>, &Array1<f64>)>,
    ) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 || n_features == 0 {
            return Err(PrazoError::TrainingError(format!(
                "training matrix is degenerate: {n_samples} x {n_features}"
            )));
        }
        if n_samples != y.len() {
            return Err(PrazoError::ShapeError {
                expected: format!("{n_samples} targets"),
                actual: format!("{} targets", y.len()),
            });
        }
        self.n_features = n_features;

        self.base_score = y.mean().unwrap_or(0.0);
        let mut preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut eval_preds = eval.map(|(xe, _)| Array1::from_elem(xe.nrows(), self.base_score));
        let mut best_rmse = f64::INFINITY;
        let mut best_round = 0usize;

        self.trees.clear();

        for round in 1..=self.config.n_estimators {
            // Squared error: grad = pred − y, hess = 1.
            let grad: Array1<f64> = &preds - y;
            let hess = Array1::from_elem(n_samples, 1.0);

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            for &i in &row_indices {
                preds[i] += self.config.learning_rate * tree.predict(&x.row(i));
            }

            if let (Some((x_eval, y_eval)), Some(eval_preds)) = (eval, eval_preds.as_mut()) {
                for i in 0..x_eval.nrows() {
                    eval_preds[i] += self.config.learning_rate * tree.predict(&x_eval.row(i));
                }
                self.trees.push(tree);

                let round_rmse = rmse(y_eval, eval_preds);
                if round_rmse < best_rmse {
                    best_rmse = round_rmse;
                    best_round = round;
                } else if let Some(patience) = self.config.early_stopping_rounds {
                    if round - best_round >= patience {
                        break;
                    }
                }
            } else {
                self.trees.push(tree);
            }
        }

        // Predictions come from the best round seen on the held-out data.
        if eval.is_some() {
            self.trees.truncate(best_round.max(1));
        }

        Ok(())
    }

    /// Number of boosting rounds in the fitted ensemble.
    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PrazoError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PrazoError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let n = x.nrows();
        let mut preds = Array1::from_elem(n, self.base_score);
        for i in 0..n {
            let row = x.row(i);
            for tree in &self.trees {
                preds[i] += self.config.learning_rate * tree.predict(&row);
            }
        }
        Ok(preds)
    }

    /// Feature importances by split count, normalized to sum 1; all zeros
    /// when the ensemble holds no splits.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(counts)
    }

    /// Serialize the fitted model for the service boundary to persist.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restore a model serialized with [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn count_splits(node: &BoostNode, counts: &mut [f64]) {
    match node {
        BoostNode::Leaf { .. } => {}
        BoostNode::Split {
            feature,
            left,
            right,
            ..
        } => {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            count_splits(left, counts);
            count_splits(right, counts);
        }
    }
}

fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let sse: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    (sse / n).sqrt()
}
