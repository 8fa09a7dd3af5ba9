//! Account store access

pub mod memory;
pub mod postgres;

use crate::config::{AppConfig, StorageBackend};
use crate::error::StorageError;
use crate::types::anomaly::{AnomalyRecord, RiskLevel};
use crate::types::transaction::TransactionRecord;
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Read/write interface to accounts, transactions and anomalies.
///
/// Implementations must tolerate concurrent calls for different accounts.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Accounts whose pending-processing marker is set
    async fn list_accounts_pending_processing(&self) -> Result<Vec<String>, StorageError>;

    /// Up to `limit` most recent transactions for an account, newest first
    async fn get_recent_transactions(
        &self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StorageError>;

    async fn put_anomaly_record(&self, record: &AnomalyRecord) -> Result<(), StorageError>;

    async fn update_transaction_risk(
        &self,
        transaction_id: &str,
        normalized_score: f64,
        risk_level: RiskLevel,
        is_anomaly: bool,
    ) -> Result<(), StorageError>;

    async fn clear_pending_processing(&self, account_id: &str) -> Result<(), StorageError>;

    /// Reachability check used by health reporting
    async fn ping(&self) -> Result<(), StorageError>;
}

/// Build the gateway selected by configuration
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn StorageGateway>, StorageError> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let store = PostgresStore::connect(&config.storage).await?;
            store.init_schema().await?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
    }
}
