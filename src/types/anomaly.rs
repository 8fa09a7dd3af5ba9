//! Risk annotations and persisted anomaly records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk tier derived from a normalized score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Determine risk level from a normalized score. Both bounds are inclusive.
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score <= thresholds.low {
            RiskLevel::Low
        } else if score <= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Upper bounds of the LOW and MEDIUM tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub low: f64,
    pub medium: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            low: 0.33,
            medium: 0.66,
        }
    }
}

/// Model input derived from one transaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub amount: f64,
    /// 0-23, UTC
    pub hour_of_day: u32,
    /// 0 = Monday ... 6 = Sunday
    pub day_of_week: u32,
    pub balance_before: f64,
    /// Same-batch, same-account transaction count, capped at 10
    pub transaction_velocity: u32,
}

impl FeatureVector {
    /// Number of model features
    pub const WIDTH: usize = 5;

    /// Fixed-order numeric encoding used as model input
    pub fn to_array(&self) -> [f64; Self::WIDTH] {
        [
            self.amount,
            self.hour_of_day as f64,
            self.day_of_week as f64,
            self.balance_before,
            self.transaction_velocity as f64,
        ]
    }
}

/// Risk annotation written back onto every scored transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnnotation {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub is_anomaly: bool,
}

/// Persisted record of a transaction flagged as anomalous
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Unique anomaly identifier (`anom-<hex>`)
    pub anomaly_id: String,

    /// Flagged transaction
    pub transaction_id: String,

    /// Owning account
    pub account_id: String,

    /// Normalized risk score (0.0 - 1.0)
    pub risk_score: f64,

    /// Risk tier of the score
    pub risk_level: RiskLevel,

    /// Detection timestamp
    pub detected_at: DateTime<Utc>,

    /// Tag of the model that produced the score
    pub model_version: String,

    /// Feature snapshot the model saw
    pub features: FeatureVector,
}

impl AnomalyRecord {
    /// Create a new anomaly record with a fresh identifier
    pub fn new(
        transaction_id: String,
        account_id: String,
        risk_score: f64,
        risk_level: RiskLevel,
        model_version: String,
        features: FeatureVector,
    ) -> Self {
        Self {
            anomaly_id: format!("anom-{}", uuid::Uuid::new_v4().simple()),
            transaction_id,
            account_id,
            risk_score,
            risk_level,
            detected_at: Utc::now(),
            model_version,
            features,
        }
    }
}
