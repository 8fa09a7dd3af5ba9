//! Readiness reporting: configuration presence and store reachability

use crate::config::AppConfig;
use crate::storage::StorageGateway;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResult {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthChecks {
    pub configuration: CheckResult,
    pub storage_connectivity: CheckResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub missing_settings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// HTTP-equivalent status for transports that need one
    pub fn status_code(&self) -> u16 {
        match self.status {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 503,
        }
    }
}

pub struct HealthChecker {
    config: Arc<AppConfig>,
    storage: Arc<dyn StorageGateway>,
}

impl HealthChecker {
    pub fn new(config: Arc<AppConfig>, storage: Arc<dyn StorageGateway>) -> Self {
        Self { config, storage }
    }

    pub async fn check(&self) -> HealthReport {
        let missing: Vec<String> = self
            .config
            .missing_settings()
            .into_iter()
            .map(str::to_string)
            .collect();

        let storage_connectivity = match self.storage.ping().await {
            Ok(()) => CheckResult::Pass,
            Err(e) => {
                error!(error = %e, "Storage connectivity check failed");
                CheckResult::Fail
            }
        };

        let configuration = if missing.is_empty() {
            CheckResult::Pass
        } else {
            CheckResult::Warning
        };

        let status = if configuration == CheckResult::Pass && storage_connectivity == CheckResult::Pass
        {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        let report = HealthReport {
            status,
            service: self.config.service.name.clone(),
            checks: HealthChecks {
                configuration,
                storage_connectivity,
            },
            missing_settings: missing,
            timestamp: Utc::now(),
        };
        debug!(report = ?report, "Health check result");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::error::StorageError;
    use crate::storage::InMemoryStore;
    use crate::types::anomaly::{AnomalyRecord, RiskLevel};
    use crate::types::transaction::TransactionRecord;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl StorageGateway for Unreachable {
        async fn list_accounts_pending_processing(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }

        async fn get_recent_transactions(
            &self,
            _account_id: &str,
            _limit: usize,
        ) -> Result<Vec<TransactionRecord>, StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }

        async fn put_anomaly_record(&self, _record: &AnomalyRecord) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }

        async fn update_transaction_risk(
            &self,
            _transaction_id: &str,
            _normalized_score: f64,
            _risk_level: RiskLevel,
            _is_anomaly: bool,
        ) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }

        async fn clear_pending_processing(&self, _account_id: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }

        async fn ping(&self) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("down".to_string()))
        }
    }

    fn memory_config() -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_healthy() {
        let checker = HealthChecker::new(memory_config(), Arc::new(InMemoryStore::new()));
        let report = checker.check().await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.status_code(), 200);
        assert_eq!(report.service, "ml-anomaly-detection");
    }

    #[tokio::test]
    async fn test_degraded_when_storage_unreachable() {
        let checker = HealthChecker::new(memory_config(), Arc::new(Unreachable));
        let report = checker.check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks.storage_connectivity, CheckResult::Fail);
        assert_eq!(report.status_code(), 503);
    }

    #[tokio::test]
    async fn test_degraded_when_settings_missing() {
        let mut config = AppConfig::default();
        config.storage.transactions_table.clear();
        let checker = HealthChecker::new(Arc::new(config), Arc::new(InMemoryStore::new()));

        let report = checker.check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks.configuration, CheckResult::Warning);
        assert_eq!(report.missing_settings, vec!["storage.transactions_table"]);
    }
}
