//! Isolation forest outlier detection
//!
//! Points that need fewer random partitions to isolate are more anomalous.
//! Scores follow the usual isolation conventions: `score_samples` is in
//! [-1, 0) with lower meaning more anomalous, and `decision_function`
//! shifts it so that the configured contamination fraction falls below 0.

use crate::error::ModelFitError;
use crate::types::anomaly::FeatureVector;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const WIDTH: usize = FeatureVector::WIDTH;
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const AUTO_MAX_SAMPLES: usize = 256;

/// Forest hyperparameters
#[derive(Debug, Clone)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    /// Rows drawn per tree; `None` is min(256, n)
    pub max_samples: Option<usize>,
    /// Expected outlier fraction, in (0, 0.5]
    pub contamination: f64,
    /// Fraction of features available to each tree, in (0, 1]
    pub max_features: f64,
    pub random_seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: None,
            contamination: 0.1,
            max_features: 1.0,
            random_seed: 42,
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow(
        data: &[[f64; WIDTH]],
        indices: Vec<usize>,
        features: &[usize],
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            root: grow_node(data, indices, features, 0, max_depth, rng),
        }
    }

    fn path_length(&self, x: &[f64; WIDTH]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn grow_node(
    data: &[[f64; WIDTH]],
    indices: Vec<usize>,
    features: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features with spread can separate this node
    let candidates: Vec<(usize, f64, f64)> = features
        .iter()
        .filter_map(|&f| {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(data[i][f]), hi.max(data[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| data[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow_node(data, left, features, depth + 1, max_depth, rng)),
        right: Box::new(grow_node(data, right, features, depth + 1, max_depth, rng)),
    }
}

/// Average path length of an unsuccessful binary search tree lookup over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A fitted isolation forest
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    samples_per_tree: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit the forest and calibrate the decision offset on the same data.
    pub fn fit(data: &[[f64; WIDTH]], params: &IsolationForestParams) -> Result<Self, ModelFitError> {
        if data.is_empty() {
            return Err(ModelFitError::Aborted("cannot fit on an empty batch".to_string()));
        }
        for (row, values) in data.iter().enumerate() {
            if let Some(column) = values.iter().position(|v| !v.is_finite()) {
                return Err(ModelFitError::NonFiniteInput { row, column });
            }
        }

        let n = data.len();
        let samples_per_tree = params
            .max_samples
            .unwrap_or(AUTO_MAX_SAMPLES)
            .clamp(1, n);
        let max_depth = (samples_per_tree.max(2) as f64).log2().ceil() as usize;
        let features_per_tree = ((params.max_features * WIDTH as f64) as usize).clamp(1, WIDTH);

        let mut rng = StdRng::seed_from_u64(params.random_seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let features: Vec<usize> = if features_per_tree == WIDTH {
                (0..WIDTH).collect()
            } else {
                sample(&mut rng, WIDTH, features_per_tree).into_vec()
            };
            let indices = sample(&mut rng, n, samples_per_tree).into_vec();
            trees.push(IsolationTree::grow(data, indices, &features, max_depth, &mut rng));
        }

        let mut forest = Self {
            trees,
            samples_per_tree,
            offset: 0.0,
        };

        let scores = forest.score_samples(data)?;
        forest.offset = percentile(&scores, 100.0 * params.contamination);
        Ok(forest)
    }

    /// Raw isolation scores in [-1, 0); lower is more anomalous.
    pub fn score_samples(&self, data: &[[f64; WIDTH]]) -> Result<Vec<f64>, ModelFitError> {
        let normalizer = average_path_length(self.samples_per_tree);
        data.iter()
            .enumerate()
            .map(|(row, x)| {
                let mean_depth = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
                    / self.trees.len().max(1) as f64;
                let score = if normalizer > 0.0 {
                    -(2f64.powf(-mean_depth / normalizer))
                } else {
                    -1.0
                };
                if score.is_finite() {
                    Ok(score)
                } else {
                    Err(ModelFitError::NonFiniteScore { row })
                }
            })
            .collect()
    }

    /// Scores shifted by the contamination offset; negative means outlier.
    pub fn decision_function(&self, data: &[[f64; WIDTH]]) -> Result<Vec<f64>, ModelFitError> {
        Ok(self
            .score_samples(data)?
            .into_iter()
            .map(|s| s - self.offset)
            .collect())
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<[f64; WIDTH]> {
        let mut data: Vec<[f64; WIDTH]> = (0..40)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.1;
                [1.0 + jitter, 0.5 - jitter, 0.2 * jitter, 1.0, 0.0]
            })
            .collect();
        data.push([25.0, -12.0, 9.0, 40.0, 3.0]);
        data
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.2448).abs() < 1e-3);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_outlier_scores_lowest() {
        let data = cluster_with_outlier();
        let forest = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap();
        let scores = forest.decision_function(&data).unwrap();

        let (worst, _) = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(worst, data.len() - 1);
        assert!(scores[worst] < 0.0);
        assert_eq!(forest.n_estimators(), 100);
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let data = cluster_with_outlier();
        let params = IsolationForestParams::default();

        let a = IsolationForest::fit(&data, &params).unwrap().decision_function(&data).unwrap();
        let b = IsolationForest::fit(&data, &params).unwrap().decision_function(&data).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_rows_are_not_outliers() {
        let data = vec![[0.0; WIDTH]; 20];
        let forest = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap();
        let scores = forest.decision_function(&data).unwrap();
        assert!(scores.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let mut data = cluster_with_outlier();
        data[3][2] = f64::INFINITY;
        let err = IsolationForest::fit(&data, &IsolationForestParams::default()).unwrap_err();
        assert!(matches!(err, ModelFitError::NonFiniteInput { row: 3, column: 2 }));
    }
}
