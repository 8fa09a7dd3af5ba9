//! Type definitions for the anomaly pipeline

pub mod anomaly;
pub mod event;
pub mod transaction;

pub use anomaly::{AnomalyRecord, FeatureVector, RiskAnnotation, RiskLevel, RiskLevelThresholds};
pub use event::{BatchSummary, InvocationEvent, InvocationKind, InvocationResult};
pub use transaction::{TransactionRecord, TransactionType};
