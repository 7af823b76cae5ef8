//! Model training
//!
//! Gradient-boosted regression with a two-phase protocol: an evaluation fit
//! on an 80/20 split discovers the round count and the only honest quality
//! numbers, then a final fit on all clean rows produces the served model.

pub mod boosting;
pub mod metrics;
pub mod split;
pub mod trainer;

pub use boosting::{BoostingConfig, GradientBoostedRegressor};
pub use metrics::RegressionMetrics;
pub use split::train_test_split;
pub use trainer::{train_two_phase, TwoPhaseConfig, TwoPhaseOutcome};
