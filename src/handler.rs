//! Routes invocation events to a batch run or a health check

use crate::health::{HealthChecker, HealthReport};
use crate::orchestrator::AnomalyPipeline;
use crate::types::event::{ErrorResponse, InvocationEvent, InvocationKind, InvocationResult};
use serde::Serialize;
use tracing::{error, info};

/// Response published for one invocation
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InvocationResponse {
    Completed(InvocationResult),
    Health(HealthReport),
    Failed(ErrorResponse),
}

impl InvocationResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Completed(result) => result.status_code,
            Self::Health(report) => report.status_code(),
            Self::Failed(err) => err.status_code,
        }
    }
}

pub struct InvocationHandler {
    pipeline: AnomalyPipeline,
    health: HealthChecker,
    service: String,
}

impl InvocationHandler {
    pub fn new(pipeline: AnomalyPipeline, health: HealthChecker, service: &str) -> Self {
        Self {
            pipeline,
            health,
            service: service.to_string(),
        }
    }

    pub async fn handle(&self, event: &InvocationEvent) -> InvocationResponse {
        match event.kind() {
            InvocationKind::HealthCheck => InvocationResponse::Health(self.health.check().await),
            kind => {
                info!(
                    kind = ?kind,
                    process_stale_accounts = event.detail.process_stale_accounts,
                    force_retrain = event.detail.force_retrain,
                    "Anomaly detection triggered"
                );
                self.detect(event).await
            }
        }
    }

    async fn detect(&self, event: &InvocationEvent) -> InvocationResponse {
        if !event.detail.process_stale_accounts {
            info!("Stale account processing disabled for this invocation");
            return InvocationResponse::Completed(InvocationResult::empty("Processing skipped"));
        }

        match self.pipeline.run_pending().await {
            Ok(Some(summary)) => {
                self.pipeline.metrics().print_summary();
                InvocationResponse::Completed(InvocationResult::completed(&summary))
            }
            Ok(None) => InvocationResponse::Completed(InvocationResult::empty(
                "No stale accounts to process",
            )),
            Err(e) => {
                error!(error = %e, "Anomaly detection run failed");
                InvocationResponse::Failed(ErrorResponse::internal(e.to_string(), &self.service))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, StorageBackend};
    use crate::feature_extractor::FeatureExtractor;
    use crate::metrics::PipelineMetrics;
    use crate::models::detector::AnomalyDetector;
    use crate::normalizer::ScoreNormalizer;
    use crate::storage::InMemoryStore;
    use crate::types::transaction::{TransactionRecord, TransactionType};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn handler(store: Arc<InMemoryStore>) -> InvocationHandler {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        let config = Arc::new(config);

        let pipeline = AnomalyPipeline::new(
            store.clone(),
            FeatureExtractor::new(),
            AnomalyDetector::new(&config.model),
            ScoreNormalizer::new(config.scoring.clone()),
            Arc::new(PipelineMetrics::new()),
            config.pipeline.clone(),
        );
        let health = HealthChecker::new(config.clone(), store);
        InvocationHandler::new(pipeline, health, &config.service.name)
    }

    fn event(payload: &str) -> InvocationEvent {
        InvocationEvent::from_payload(payload.as_bytes()).unwrap()
    }

    fn message(response: &InvocationResponse) -> &str {
        match response {
            InvocationResponse::Completed(result) => &result.message,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_health_event() {
        let handler = handler(Arc::new(InMemoryStore::new()));
        let response = handler
            .handle(&event(r#"{"httpMethod":"GET","path":"/health"}"#))
            .await;

        assert!(matches!(response, InvocationResponse::Health(_)));
        assert_eq!(response.status_code(), 200);
    }

    #[tokio::test]
    async fn test_processing_disabled() {
        let store = Arc::new(InMemoryStore::new());
        store.mark_pending("acct-1");
        let handler = handler(store.clone());

        let response = handler
            .handle(&event(r#"{"detail":{"processStaleAccounts":false}}"#))
            .await;

        assert_eq!(message(&response), "Processing skipped");
        assert!(store.is_pending("acct-1"));
    }

    #[tokio::test]
    async fn test_nothing_pending() {
        let handler = handler(Arc::new(InMemoryStore::new()));
        let response = handler.handle(&event("")).await;

        assert_eq!(message(&response), "No stale accounts to process");
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("processedAccounts").is_none());
    }

    #[tokio::test]
    async fn test_scheduled_run_completes() {
        let store = Arc::new(InMemoryStore::new());
        store.mark_pending("acct-1");
        for i in 0..12 {
            store.insert_transaction(TransactionRecord::new(
                format!("tx-{i:02}"),
                "acct-1",
                Decimal::from(20 + i),
                TransactionType::Purchase,
                Decimal::from(1000),
                format!("2024-05-01T{:02}:00:00Z", i + 8),
            ));
        }
        let handler = handler(store.clone());

        let response = handler
            .handle(&event(
                r#"{"source":"liveflow.scheduler","detail-type":"Detect Anomalies","detail":{}}"#,
            ))
            .await;

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["message"], "Anomaly detection completed");
        assert_eq!(json["processedAccounts"], 1);
        assert!(!store.is_pending("acct-1"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_listing();
        let handler = handler(store);

        let response = handler.handle(&event("{}")).await;

        assert_eq!(response.status_code(), 500);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["service"], "ml-anomaly-detection");
        assert_eq!(json["error"], "Internal server error");
    }
}
