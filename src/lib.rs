//! Account Anomaly Pipeline Library
//!
//! Batch anomaly scoring over accounts with recent transaction activity.
//! Each pending account gets its own unsupervised isolation forest, fitted
//! on that account's recent history; every transaction is annotated with a
//! normalized risk score and tier, and flagged rows are recorded as anomalies.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod handler;
pub mod health;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod producer;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use consumer::TriggerConsumer;
pub use error::{PipelineError, PipelineResult};
pub use feature_extractor::FeatureExtractor;
pub use handler::{InvocationHandler, InvocationResponse};
pub use models::detector::AnomalyDetector;
pub use normalizer::ScoreNormalizer;
pub use orchestrator::AnomalyPipeline;
pub use producer::ResultProducer;
pub use storage::StorageGateway;
pub use types::{anomaly::AnomalyRecord, transaction::TransactionRecord};
