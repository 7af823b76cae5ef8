//! Prazo - Delivery-time estimation for e-commerce parcel logistics
//!
//! This crate implements the offline pipeline behind a delivery-time
//! estimation service:
//! - Joining the six raw order/geolocation tables into one feature table
//! - Deriving geospatial, temporal, and physical features
//! - Flagging anomalous deliveries with an Isolation Forest
//! - Training a gradient-boosted regressor with a validate-then-refit protocol
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`data`] - Raw table records and CSV ingestion
//! - [`geo`] - Geolocation reduction and great-circle distance
//! - [`join`] - Denormalizing join engine
//! - [`features`] - Feature derivation and the delivered-only gate
//! - [`anomaly`] - Unsupervised outlier labeling
//! - [`training`] - Two-phase gradient-boosting trainer/evaluator
//!
//! ## Services
//! - [`pipeline`] - End-to-end orchestration and run report
//! - [`inference`] - Prediction-service boundary (validation, warnings)
//!
//! ## Support
//! - [`preprocessing`] - Feature standardization

// Core error handling
pub mod error;

// Pipeline stages
pub mod data;
pub mod geo;
pub mod join;
pub mod features;
pub mod anomaly;
pub mod training;

// Support
pub mod preprocessing;

// Services
pub mod pipeline;
pub mod inference;

pub use error::{PrazoError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PrazoError, Result};

    // Raw data
    pub use crate::data::{RawTables, TableLoader};

    // Geospatial
    pub use crate::geo::{haversine_km, GeoIndex};

    // Features
    pub use crate::features::{derive_features, FeatureRecord, FEATURE_NAMES};

    // Anomaly detection
    pub use crate::anomaly::{flag_anomalies, AnomalyConfig, AnomalyDetector, IsolationForest};

    // Training
    pub use crate::training::{
        train_two_phase, BoostingConfig, GradientBoostedRegressor, RegressionMetrics,
        TwoPhaseConfig, TwoPhaseOutcome,
    };

    // Orchestration
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};

    // Serving boundary
    pub use crate::inference::{Prediction, PredictionEngine, PredictionRequest};
}
