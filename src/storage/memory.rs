//! In-process account store

use super::StorageGateway;
use crate::error::StorageError;
use crate::types::anomaly::{AnomalyRecord, RiskAnnotation, RiskLevel};
use crate::types::transaction::TransactionRecord;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Default)]
struct StoreState {
    /// account id -> pending marker
    accounts: BTreeMap<String, bool>,
    transactions: HashMap<String, TransactionRecord>,
    risk: HashMap<String, RiskAnnotation>,
    anomalies: Vec<AnomalyRecord>,
    /// Accounts whose transaction reads fail
    failing_reads: HashSet<String>,
    failing_listing: bool,
    /// account id -> writes allowed before every further write fails
    write_budget: HashMap<String, usize>,
}

impl StoreState {
    fn charge_write(&mut self, account_id: &str) -> Result<(), StorageError> {
        match self.write_budget.get_mut(account_id) {
            Some(0) => Err(StorageError::Unavailable(format!(
                "writes for account {account_id} are failing"
            ))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Map-backed store. Safe to share across account tasks.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an account, optionally marked for processing
    pub fn insert_account(&self, account_id: &str, pending: bool) {
        self.write().accounts.insert(account_id.to_string(), pending);
    }

    pub fn mark_pending(&self, account_id: &str) {
        self.insert_account(account_id, true);
    }

    /// Add a transaction; its account is registered if unknown
    pub fn insert_transaction(&self, record: TransactionRecord) {
        let mut state = self.write();
        state.accounts.entry(record.account_id.clone()).or_insert(false);
        state.transactions.insert(record.transaction_id.clone(), record);
    }

    /// Make every transaction read for `account_id` fail
    pub fn fail_reads_for(&self, account_id: &str) {
        self.write().failing_reads.insert(account_id.to_string());
    }

    /// Let `after` writes for `account_id` succeed, then fail every
    /// risk update, anomaly insert and marker clear for it
    pub fn fail_writes_for(&self, account_id: &str, after: usize) {
        self.write().write_budget.insert(account_id.to_string(), after);
    }

    /// Make enumeration of pending accounts fail
    pub fn fail_listing(&self) {
        self.write().failing_listing = true;
    }

    pub fn is_pending(&self, account_id: &str) -> bool {
        self.read().accounts.get(account_id).copied().unwrap_or(false)
    }

    pub fn risk_annotation(&self, transaction_id: &str) -> Option<RiskAnnotation> {
        self.read().risk.get(transaction_id).cloned()
    }

    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.read().anomalies.clone()
    }

    pub fn anomalies_for(&self, account_id: &str) -> Vec<AnomalyRecord> {
        self.read()
            .anomalies
            .iter()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StorageGateway for InMemoryStore {
    async fn list_accounts_pending_processing(&self) -> Result<Vec<String>, StorageError> {
        let state = self.read();
        if state.failing_listing {
            return Err(StorageError::Unavailable(
                "pending accounts could not be listed".to_string(),
            ));
        }
        let pending: Vec<String> = state
            .accounts
            .iter()
            .filter(|(_, pending)| **pending)
            .map(|(id, _)| id.clone())
            .collect();
        debug!(count = pending.len(), "Listed pending accounts");
        Ok(pending)
    }

    async fn get_recent_transactions(
        &self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        let state = self.read();
        if state.failing_reads.contains(account_id) {
            return Err(StorageError::Unavailable(format!(
                "transactions for account {account_id} could not be read"
            )));
        }

        let mut records: Vec<TransactionRecord> = state
            .transactions
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.transaction_id.cmp(&a.transaction_id))
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn put_anomaly_record(&self, record: &AnomalyRecord) -> Result<(), StorageError> {
        let mut state = self.write();
        state.charge_write(&record.account_id)?;
        state.anomalies.push(record.clone());
        Ok(())
    }

    async fn update_transaction_risk(
        &self,
        transaction_id: &str,
        normalized_score: f64,
        risk_level: RiskLevel,
        is_anomaly: bool,
    ) -> Result<(), StorageError> {
        let mut state = self.write();
        let Some(account_id) = state
            .transactions
            .get(transaction_id)
            .map(|t| t.account_id.clone())
        else {
            return Err(StorageError::Database(format!(
                "unknown transaction {transaction_id}"
            )));
        };
        state.charge_write(&account_id)?;
        state.risk.insert(
            transaction_id.to_string(),
            RiskAnnotation {
                risk_score: normalized_score,
                risk_level,
                is_anomaly,
            },
        );
        Ok(())
    }

    async fn clear_pending_processing(&self, account_id: &str) -> Result<(), StorageError> {
        let mut state = self.write();
        state.charge_write(account_id)?;
        state.accounts.insert(account_id.to_string(), false);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
