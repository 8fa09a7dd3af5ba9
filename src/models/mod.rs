//! Unsupervised anomaly model components

pub mod detector;
pub mod isolation_forest;
pub mod scaler;

pub use detector::{AnomalyDetector, ModelOutput, Prediction};
pub use isolation_forest::{IsolationForest, IsolationForestParams};
pub use scaler::StandardScaler;
