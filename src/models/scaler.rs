//! Per-batch feature standardization

use crate::error::ModelFitError;
use crate::types::anomaly::FeatureVector;

const WIDTH: usize = FeatureVector::WIDTH;

/// Zero-mean, unit-variance scaling fitted on a single batch.
///
/// Columns with zero variance keep a scale of 1 so they map to 0.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: [f64; WIDTH],
    scale: [f64; WIDTH],
}

impl StandardScaler {
    /// Fit column statistics. Rejects non-finite input.
    pub fn fit(rows: &[[f64; WIDTH]]) -> Result<Self, ModelFitError> {
        for (row, values) in rows.iter().enumerate() {
            if let Some(column) = values.iter().position(|v| !v.is_finite()) {
                return Err(ModelFitError::NonFiniteInput { row, column });
            }
        }

        let n = rows.len().max(1) as f64;
        let mut mean = [0.0; WIDTH];
        let mut scale = [1.0; WIDTH];

        for c in 0..WIDTH {
            let first = rows.first().map(|r| r[c]).unwrap_or(0.0);
            if rows.iter().all(|r| r[c] == first) {
                mean[c] = first;
                continue;
            }

            mean[c] = rows.iter().map(|r| r[c]).sum::<f64>() / n;
            let variance = rows.iter().map(|r| (r[c] - mean[c]).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            if std.is_finite() && std > 0.0 {
                scale[c] = std;
            }
        }

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, rows: &[[f64; WIDTH]]) -> Vec<[f64; WIDTH]> {
        rows.iter()
            .map(|values| {
                let mut out = [0.0; WIDTH];
                for c in 0..WIDTH {
                    out[c] = (values[c] - self.mean[c]) / self.scale[c];
                }
                out
            })
            .collect()
    }

    pub fn fit_transform(rows: &[[f64; WIDTH]]) -> Result<Vec<[f64; WIDTH]>, ModelFitError> {
        Ok(Self::fit(rows)?.transform(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_columns() {
        let rows = vec![
            [1.0, 10.0, 0.0, 5.0, 2.0],
            [3.0, 20.0, 0.0, 5.0, 2.0],
            [5.0, 30.0, 0.0, 5.0, 2.0],
        ];

        let scaled = StandardScaler::fit_transform(&rows).unwrap();

        for c in 0..WIDTH {
            let mean: f64 = scaled.iter().map(|r| r[c]).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
        }
        let var: f64 = scaled.iter().map(|r| r[0].powi(2)).sum::<f64>() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);
        // constant columns collapse to zero instead of dividing by zero
        assert!(scaled.iter().all(|r| r[2] == 0.0 && r[3] == 0.0));
    }

    #[test]
    fn test_rejects_non_finite() {
        let rows = vec![[1.0, 2.0, 3.0, 4.0, 5.0], [1.0, f64::NAN, 3.0, 4.0, 5.0]];
        let err = StandardScaler::fit(&rows).unwrap_err();
        assert!(matches!(err, ModelFitError::NonFiniteInput { row: 1, column: 1 }));
    }
}
