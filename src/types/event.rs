//! Invocation events and their results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event source used by the scheduler trigger
pub const SCHEDULER_SOURCE: &str = "liveflow.scheduler";
/// Detail type used by the scheduler trigger
pub const DETECT_ANOMALIES: &str = "Detect Anomalies";

/// How an incoming event should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    Scheduled,
    HealthCheck,
    Direct,
}

/// Run parameters carried in an event's `detail`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDetail {
    #[serde(default = "default_true")]
    pub process_stale_accounts: bool,
    /// Accepted for compatibility; models are refit on every run regardless
    #[serde(default)]
    pub force_retrain: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TriggerDetail {
    fn default() -> Self {
        Self {
            process_stale_accounts: true,
            force_retrain: false,
        }
    }
}

/// Incoming trigger message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationEvent {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(rename = "detail-type", default)]
    pub detail_type: Option<String>,
    #[serde(default)]
    pub detail: TriggerDetail,
    #[serde(rename = "httpMethod", default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl InvocationEvent {
    /// Decode an event payload. An empty payload is a direct invocation.
    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(payload)
    }

    pub fn kind(&self) -> InvocationKind {
        if self.source.as_deref() == Some(SCHEDULER_SOURCE)
            && self.detail_type.as_deref() == Some(DETECT_ANOMALIES)
        {
            InvocationKind::Scheduled
        } else if self.http_method.as_deref() == Some("GET") && self.path.as_deref() == Some("/health")
        {
            InvocationKind::HealthCheck
        } else {
            InvocationKind::Direct
        }
    }
}

/// Aggregate outcome of one batch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Accounts that were scored and had their marker cleared
    pub processed_accounts: usize,
    /// Anomalies recorded across processed accounts
    pub total_anomalies: usize,
    /// Accounts cleared without scoring (too few transactions)
    pub skipped_accounts: usize,
    /// Accounts whose processing failed; their marker stays set
    pub failed_accounts: usize,
}

/// Result published for a completed invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_accounts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_anomalies: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl InvocationResult {
    /// Result of a run that reached the account loop
    pub fn completed(summary: &BatchSummary) -> Self {
        Self {
            status_code: 200,
            message: "Anomaly detection completed".to_string(),
            processed_accounts: Some(summary.processed_accounts),
            total_anomalies: Some(summary.total_anomalies),
            timestamp: Utc::now(),
        }
    }

    /// Result of a run that ended without touching any account
    pub fn empty(message: &str) -> Self {
        Self {
            status_code: 200,
            message: message.to_string(),
            processed_accounts: None,
            total_anomalies: None,
            timestamp: Utc::now(),
        }
    }
}

/// Published instead of a result when an invocation fails
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub error: String,
    pub message: String,
    pub service: String,
}

impl ErrorResponse {
    pub fn internal(message: String, service: &str) -> Self {
        Self {
            status_code: 500,
            error: "Internal server error".to_string(),
            message,
            service: service.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_routing() {
        let scheduled = InvocationEvent::from_payload(
            br#"{"source":"liveflow.scheduler","detail-type":"Detect Anomalies","detail":{"forceRetrain":true}}"#,
        )
        .unwrap();
        assert_eq!(scheduled.kind(), InvocationKind::Scheduled);
        assert!(scheduled.detail.process_stale_accounts);
        assert!(scheduled.detail.force_retrain);

        let health = InvocationEvent::from_payload(br#"{"httpMethod":"GET","path":"/health"}"#).unwrap();
        assert_eq!(health.kind(), InvocationKind::HealthCheck);

        let direct = InvocationEvent::from_payload(b"").unwrap();
        assert_eq!(direct.kind(), InvocationKind::Direct);
        assert!(direct.detail.process_stale_accounts);
    }

    #[test]
    fn test_processing_can_be_disabled() {
        let event =
            InvocationEvent::from_payload(br#"{"detail":{"processStaleAccounts":false}}"#).unwrap();
        assert_eq!(event.kind(), InvocationKind::Direct);
        assert!(!event.detail.process_stale_accounts);
    }

    #[test]
    fn test_result_wire_format() {
        let summary = BatchSummary {
            processed_accounts: 3,
            total_anomalies: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(InvocationResult::completed(&summary)).unwrap();

        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["processedAccounts"], 3);
        assert_eq!(json["totalAnomalies"], 2);

        let json = serde_json::to_value(InvocationResult::empty("Processing skipped")).unwrap();
        assert!(json.get("processedAccounts").is_none());
    }
}
