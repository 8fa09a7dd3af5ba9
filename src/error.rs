//! Error taxonomy for the scoring pipeline

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Any failure the pipeline can surface
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid settings; fatal before any processing
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    FeatureExtraction(#[from] FeatureExtractionError),

    #[error(transparent)]
    ModelFit(#[from] ModelFitError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Malformed transaction data; aborts extraction for the whole batch
#[derive(Debug, Error)]
pub enum FeatureExtractionError {
    #[error("transaction {transaction_id}: missing required field `{field}`")]
    MissingField {
        transaction_id: String,
        field: &'static str,
    },

    #[error("transaction {transaction_id}: invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        transaction_id: String,
        value: String,
        reason: String,
    },

    #[error("transaction {transaction_id}: `{field}` is not a finite number")]
    InvalidAmount {
        transaction_id: String,
        field: &'static str,
    },
}

/// Numerical failure while fitting or scoring
#[derive(Debug, Error)]
pub enum ModelFitError {
    #[error("non-finite feature value at row {row}, column {column}")]
    NonFiniteInput { row: usize, column: usize },

    #[error("model produced a non-finite score for row {row}")]
    NonFiniteScore { row: usize },

    #[error("model returned {actual} rows for {expected} inputs")]
    RowMismatch { expected: usize, actual: usize },

    #[error("model fit aborted: {0}")]
    Aborted(String),
}

/// Read or write failure against the account store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("could not decode stored {entity}: {reason}")]
    Decode { entity: &'static str, reason: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Decode {
            entity: "json",
            reason: err.to_string(),
        }
    }
}
