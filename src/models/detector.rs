//! Per-account anomaly model: standardize, fit, predict.

use crate::config::ModelConfig;
use crate::error::ModelFitError;
use crate::feature_extractor::FeatureMatrix;
use crate::models::isolation_forest::{IsolationForest, IsolationForestParams};
use crate::models::scaler::StandardScaler;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Binary model label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Prediction {
    Anomaly,
    Normal,
}

impl Prediction {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Prediction::Anomaly)
    }
}

/// Labels and raw scores for one batch, row-aligned with the input matrix
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub predictions: Vec<Prediction>,
    /// Unbounded; lower is more anomalous
    pub raw_scores: Vec<f64>,
}

impl ModelOutput {
    /// All-normal output used when there is too little data to fit
    fn all_normal(n: usize) -> Self {
        Self {
            predictions: vec![Prediction::Normal; n],
            raw_scores: vec![0.0; n],
        }
    }

    pub fn anomaly_count(&self) -> usize {
        self.predictions.iter().filter(|p| p.is_anomaly()).count()
    }

    /// Check that labels and scores line up with `rows` inputs
    pub fn ensure_rows(&self, rows: usize) -> Result<(), ModelFitError> {
        for actual in [self.predictions.len(), self.raw_scores.len()] {
            if actual != rows {
                return Err(ModelFitError::RowMismatch {
                    expected: rows,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Unsupervised outlier model refit from scratch for every batch.
///
/// Holds only hyperparameters; nothing fitted survives a call.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    params: IsolationForestParams,
    min_training_samples: usize,
    model_version: String,
}

impl AnomalyDetector {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            params: IsolationForestParams {
                n_estimators: config.n_estimators,
                max_samples: config.max_samples,
                contamination: config.contamination,
                max_features: config.max_features,
                random_seed: config.random_seed,
            },
            min_training_samples: config.min_training_samples,
            model_version: config.model_version.clone(),
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn min_training_samples(&self) -> usize {
        self.min_training_samples
    }

    /// Fit on `features` and label every row.
    ///
    /// Batches smaller than `min_training_samples` are not fitted: every row
    /// is NORMAL with a raw score of 0.
    pub fn fit_predict(&self, features: &FeatureMatrix) -> Result<ModelOutput, ModelFitError> {
        let n = features.n_rows();
        debug!(samples = n, "Fitting isolation forest");

        if n < self.min_training_samples {
            warn!(
                samples = n,
                required = self.min_training_samples,
                "Insufficient data for training, treating batch as normal"
            );
            return Ok(ModelOutput::all_normal(n));
        }

        let scaled = StandardScaler::fit_transform(&features.to_arrays())?;
        let forest = IsolationForest::fit(&scaled, &self.params)?;
        let raw_scores = forest.decision_function(&scaled)?;

        let predictions: Vec<Prediction> = raw_scores
            .iter()
            .map(|&s| if s < 0.0 { Prediction::Anomaly } else { Prediction::Normal })
            .collect();

        let output = ModelOutput {
            predictions,
            raw_scores,
        };

        info!(
            samples = n,
            anomalies = output.anomaly_count(),
            offset = forest.offset(),
            "Model training complete"
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::anomaly::FeatureVector;

    #[test]
    fn test_output_row_alignment() {
        let output = ModelOutput::all_normal(4);
        assert!(output.ensure_rows(4).is_ok());
        assert!(matches!(
            output.ensure_rows(5),
            Err(ModelFitError::RowMismatch { expected: 5, actual: 4 })
        ));

        let mut short_scores = output.clone();
        short_scores.raw_scores.pop();
        assert!(matches!(
            short_scores.ensure_rows(4),
            Err(ModelFitError::RowMismatch { expected: 4, actual: 3 })
        ));
    }

    fn row(amount: f64, hour: u32) -> FeatureVector {
        FeatureVector {
            amount,
            hour_of_day: hour,
            day_of_week: 2,
            balance_before: 1000.0,
            transaction_velocity: 10,
        }
    }

    #[test]
    fn test_small_batch_skips_fitting() {
        let detector = AnomalyDetector::new(&ModelConfig::default());
        let matrix = FeatureMatrix::new((0..9).map(|i| row(i as f64, 12)).collect());

        let output = detector.fit_predict(&matrix).unwrap();

        assert_eq!(output.predictions, vec![Prediction::Normal; 9]);
        assert_eq!(output.raw_scores, vec![0.0; 9]);
    }

    #[test]
    fn test_flags_roughly_contamination_fraction() {
        let detector = AnomalyDetector::new(&ModelConfig::default());
        let mut rows: Vec<FeatureVector> = (0..49)
            .map(|i| row(40.0 + (i % 5) as f64, 10 + (i % 4) as u32))
            .collect();
        rows.push(row(9_500.0, 3));
        let matrix = FeatureMatrix::new(rows);

        let output = detector.fit_predict(&matrix).unwrap();

        assert_eq!(output.predictions.len(), 50);
        assert_eq!(output.raw_scores.len(), 50);
        assert_eq!(output.predictions[49], Prediction::Anomaly);
        let flagged = output.anomaly_count();
        assert!(flagged >= 1 && flagged <= 10, "flagged {flagged}");
    }

    #[test]
    fn test_degenerate_matrix_is_all_normal() {
        let detector = AnomalyDetector::new(&ModelConfig::default());
        let matrix = FeatureMatrix::new(vec![row(10.0, 9); 15]);

        let output = detector.fit_predict(&matrix).unwrap();

        assert_eq!(output.anomaly_count(), 0);
    }

    #[test]
    fn test_non_finite_features_fail() {
        let detector = AnomalyDetector::new(&ModelConfig::default());
        let mut rows: Vec<FeatureVector> = (0..12).map(|i| row(i as f64, 1)).collect();
        rows[4].amount = f64::NAN;

        let err = detector.fit_predict(&FeatureMatrix::new(rows)).unwrap_err();
        assert!(matches!(err, ModelFitError::NonFiniteInput { row: 4, .. }));
    }
}
