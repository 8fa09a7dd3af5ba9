//! Maps raw model scores onto a bounded risk scale

use crate::types::anomaly::{RiskLevel, RiskLevelThresholds};
use tracing::debug;

/// Score assigned to every row when a batch has no spread
pub const UNIFORM_SCORE: f64 = 0.5;

/// Min-max normalizer, inverted so the most anomalous raw score maps to 1.0.
pub struct ScoreNormalizer {
    thresholds: RiskLevelThresholds,
}

impl ScoreNormalizer {
    pub fn new(thresholds: RiskLevelThresholds) -> Self {
        Self { thresholds }
    }

    /// Rescale raw scores into [0, 1].
    ///
    /// If every raw score is identical, every result is [`UNIFORM_SCORE`].
    pub fn normalize(&self, raw_scores: &[f64]) -> Vec<f64> {
        if raw_scores.is_empty() {
            return Vec::new();
        }

        let min = raw_scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = raw_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let normalized: Vec<f64> = if max == min {
            vec![UNIFORM_SCORE; raw_scores.len()]
        } else {
            let range = max - min;
            raw_scores
                .iter()
                .map(|s| ((max - s) / range).clamp(0.0, 1.0))
                .collect()
        };

        debug!(
            count = normalized.len(),
            raw_min = min,
            raw_max = max,
            "Score normalization complete"
        );
        normalized
    }

    pub fn risk_level(&self, score: f64) -> RiskLevel {
        RiskLevel::from_score(score, &self.thresholds)
    }

    pub fn thresholds(&self) -> &RiskLevelThresholds {
        &self.thresholds
    }
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        Self::new(RiskLevelThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_min_max() {
        let normalizer = ScoreNormalizer::default();
        assert_eq!(normalizer.normalize(&[-0.5, 0.0, 0.5]), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_uniform_scores() {
        let normalizer = ScoreNormalizer::default();
        let normalized = normalizer.normalize(&[0.0; 7]);

        assert_eq!(normalized, vec![0.5; 7]);
        assert!(normalized
            .iter()
            .all(|s| normalizer.risk_level(*s) == RiskLevel::Medium));
    }

    #[test]
    fn test_empty_scores() {
        assert!(ScoreNormalizer::default().normalize(&[]).is_empty());
    }

    #[test]
    fn test_tiering_is_monotonic() {
        let normalizer = ScoreNormalizer::default();
        let mut previous = RiskLevel::Low;
        for step in 0..=1000 {
            let level = normalizer.risk_level(step as f64 / 1000.0);
            let rank = |l: RiskLevel| match l {
                RiskLevel::Low => 0,
                RiskLevel::Medium => 1,
                RiskLevel::High => 2,
            };
            assert!(rank(level) >= rank(previous));
            previous = level;
        }
        assert_eq!(normalizer.risk_level(0.33), RiskLevel::Low);
        assert_eq!(normalizer.risk_level(0.660001), RiskLevel::High);
    }
}
