//! Feature extraction for per-account anomaly scoring.
//!
//! Each transaction becomes a five-wide feature vector. Column order is fixed
//! and matches `FeatureExtractor::feature_names`.

use crate::error::FeatureExtractionError;
use crate::types::anomaly::FeatureVector;
use crate::types::transaction::TransactionRecord;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// Upper bound of the velocity feature
pub const VELOCITY_CAP: u32 = 10;

/// ISO 8601 layouts without an offset; values are read as UTC
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Row-major feature matrix of shape (n, 5)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<FeatureVector>,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<FeatureVector>) -> Self {
        Self { rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        FeatureVector::WIDTH
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&FeatureVector> {
        self.rows.get(index)
    }

    /// Numeric view used for model fitting
    pub fn to_arrays(&self) -> Vec<[f64; FeatureVector::WIDTH]> {
        self.rows.iter().map(FeatureVector::to_array).collect()
    }
}

/// Feature extractor that turns a transaction batch into model input.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features for every transaction in the batch.
    ///
    /// Any malformed transaction fails the whole batch; no partial matrix is
    /// returned. An empty batch yields an empty matrix.
    ///
    /// `transactionVelocity` counts transactions in this batch that share the
    /// account, capped at [`VELOCITY_CAP`]. It is a frequency proxy, not a
    /// time-windowed rate.
    pub fn extract(
        &self,
        transactions: &[TransactionRecord],
    ) -> Result<FeatureMatrix, FeatureExtractionError> {
        debug!(count = transactions.len(), "Extracting features");

        let mut per_account: HashMap<&str, u32> = HashMap::new();
        for tx in transactions {
            *per_account.entry(tx.account_id.as_str()).or_insert(0) += 1;
        }

        let mut rows = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let features = self.extract_one(tx, &per_account)?;
            debug!(transaction_id = %tx.transaction_id, features = ?features, "Extracted features");
            rows.push(features);
        }

        Ok(FeatureMatrix::new(rows))
    }

    fn extract_one(
        &self,
        tx: &TransactionRecord,
        per_account: &HashMap<&str, u32>,
    ) -> Result<FeatureVector, FeatureExtractionError> {
        if tx.transaction_id.trim().is_empty() {
            return Err(FeatureExtractionError::MissingField {
                transaction_id: "<unknown>".to_string(),
                field: "transaction_id",
            });
        }
        if tx.account_id.trim().is_empty() {
            return Err(missing(tx, "account_id"));
        }
        if tx.timestamp.trim().is_empty() {
            return Err(missing(tx, "timestamp"));
        }

        let timestamp =
            parse_timestamp(&tx.timestamp).map_err(|reason| FeatureExtractionError::InvalidTimestamp {
                transaction_id: tx.transaction_id.clone(),
                value: tx.timestamp.clone(),
                reason,
            })?;

        let balance_before = if tx.transaction_type.is_debit() {
            tx.balance_after.checked_add(tx.amount)
        } else {
            tx.balance_after.checked_sub(tx.amount)
        }
        .ok_or_else(|| FeatureExtractionError::InvalidAmount {
            transaction_id: tx.transaction_id.clone(),
            field: "balance_after",
        })?;

        let velocity = per_account
            .get(tx.account_id.as_str())
            .copied()
            .unwrap_or(1)
            .min(VELOCITY_CAP);

        Ok(FeatureVector {
            amount: to_finite(tx, tx.amount, "amount")?,
            hour_of_day: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            balance_before: to_finite(tx, balance_before, "balance_after")?,
            transaction_velocity: velocity,
        })
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FeatureVector::WIDTH
    }

    /// Get feature names in column order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        vec![
            "amount",
            "hourOfDay",
            "dayOfWeek",
            "balanceBefore",
            "transactionVelocity",
        ]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a stored timestamp. RFC 3339 first, then ISO 8601 without an
/// offset, which is taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    let rfc3339_err = match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => return Ok(ts.with_timezone(&Utc)),
        Err(e) => e,
    };

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| rfc3339_err.to_string())
}

fn missing(tx: &TransactionRecord, field: &'static str) -> FeatureExtractionError {
    FeatureExtractionError::MissingField {
        transaction_id: tx.transaction_id.clone(),
        field,
    }
}

fn to_finite(
    tx: &TransactionRecord,
    value: Decimal,
    field: &'static str,
) -> Result<f64, FeatureExtractionError> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FeatureExtractionError::InvalidAmount {
            transaction_id: tx.transaction_id.clone(),
            field,
        })
}
