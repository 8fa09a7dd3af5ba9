//! Batch orchestration over accounts awaiting anomaly processing.
//!
//! Each account is an independent unit of work: fetch recent transactions,
//! extract features, fit and score, normalize, persist annotations and
//! anomaly records, then clear the pending marker. A failure inside one
//! account is logged and counted; it never stops the other accounts. An
//! account that fails keeps its marker and is retried by a later run.

use crate::config::PipelineConfig;
use crate::error::{ModelFitError, PipelineError, PipelineResult};
use crate::feature_extractor::{FeatureExtractor, FeatureMatrix};
use crate::metrics::PipelineMetrics;
use crate::models::detector::{AnomalyDetector, ModelOutput};
use crate::normalizer::ScoreNormalizer;
use crate::storage::StorageGateway;
use crate::types::anomaly::AnomalyRecord;
use crate::types::event::BatchSummary;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// How a single account left the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    /// Too few transactions; marker cleared without scoring
    Skipped { transactions: usize },
    /// Scored, persisted, marker cleared
    Processed { transactions: usize, anomalies: usize },
}

/// Runs the scoring pipeline over many accounts with bounded concurrency.
#[derive(Clone)]
pub struct AnomalyPipeline {
    storage: Arc<dyn StorageGateway>,
    extractor: Arc<FeatureExtractor>,
    detector: Arc<AnomalyDetector>,
    normalizer: Arc<ScoreNormalizer>,
    metrics: Arc<PipelineMetrics>,
    settings: PipelineConfig,
}

impl AnomalyPipeline {
    pub fn new(
        storage: Arc<dyn StorageGateway>,
        extractor: FeatureExtractor,
        detector: AnomalyDetector,
        normalizer: ScoreNormalizer,
        metrics: Arc<PipelineMetrics>,
        settings: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            extractor: Arc::new(extractor),
            detector: Arc::new(detector),
            normalizer: Arc::new(normalizer),
            metrics,
            settings,
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Enumerate pending accounts and process them. `None` when no account
    /// is pending; nothing runs in that case.
    ///
    /// Failing to enumerate aborts the whole run.
    pub async fn run_pending(&self) -> PipelineResult<Option<BatchSummary>> {
        let accounts = self.storage.list_accounts_pending_processing().await?;
        if accounts.is_empty() {
            info!("No stale accounts to process");
            return Ok(None);
        }
        Ok(Some(self.run(accounts).await))
    }

    /// Process the given accounts. Only accounts that were fully scored
    /// count towards `processed_accounts`.
    pub async fn run(&self, accounts: Vec<String>) -> BatchSummary {
        info!(
            accounts = accounts.len(),
            workers = self.settings.workers,
            "Starting anomaly detection processing"
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let mut handles = Vec::with_capacity(accounts.len());

        for account_id in accounts {
            let semaphore = semaphore.clone();
            let pipeline = self.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let result = pipeline.process_account(&account_id).await;
                (account_id, result)
            });
            handles.push(handle);
        }

        let mut summary = BatchSummary::default();
        for joined in join_all(handles).await {
            match joined {
                Ok((_, Ok(AccountOutcome::Processed { anomalies, .. }))) => {
                    summary.processed_accounts += 1;
                    summary.total_anomalies += anomalies;
                }
                Ok((_, Ok(AccountOutcome::Skipped { .. }))) => {
                    summary.skipped_accounts += 1;
                }
                Ok((account_id, Err(e))) => {
                    summary.failed_accounts += 1;
                    self.metrics.record_failure();
                    error!(account_id = %account_id, error = %e, "Failed to process account");
                }
                Err(e) => {
                    summary.failed_accounts += 1;
                    self.metrics.record_failure();
                    error!(error = %e, "Account task aborted");
                }
            }
        }

        self.metrics.record_run();
        info!(
            processed_accounts = summary.processed_accounts,
            total_anomalies = summary.total_anomalies,
            skipped_accounts = summary.skipped_accounts,
            failed_accounts = summary.failed_accounts,
            "Anomaly detection complete"
        );
        summary
    }

    /// Score one account end to end.
    pub async fn process_account(&self, account_id: &str) -> PipelineResult<AccountOutcome> {
        let start = Instant::now();
        info!(account_id = %account_id, "Processing account");

        let transactions = self
            .storage
            .get_recent_transactions(account_id, self.settings.transaction_limit)
            .await?;

        if transactions.len() < self.settings.min_transactions {
            warn!(
                account_id = %account_id,
                transactions = transactions.len(),
                "Insufficient transactions, skipping scoring"
            );
            self.storage.clear_pending_processing(account_id).await?;
            self.metrics.record_skipped();
            return Ok(AccountOutcome::Skipped {
                transactions: transactions.len(),
            });
        }

        let features = self.extractor.extract(&transactions)?;
        let (features, output) = self.fit_predict(features).await?;
        output.ensure_rows(transactions.len())?;
        let scores = self.normalizer.normalize(&output.raw_scores);

        let mut anomalies = 0;
        for (i, tx) in transactions.iter().enumerate() {
            let score = scores[i];
            let is_anomaly = output.predictions[i].is_anomaly();
            let risk_level = self.normalizer.risk_level(score);

            self.storage
                .update_transaction_risk(&tx.transaction_id, score, risk_level, is_anomaly)
                .await?;

            if is_anomaly {
                let snapshot = &features.rows()[i];
                let record = AnomalyRecord::new(
                    tx.transaction_id.clone(),
                    account_id.to_string(),
                    score,
                    risk_level,
                    self.detector.model_version().to_string(),
                    *snapshot,
                );
                self.storage.put_anomaly_record(&record).await?;
                debug!(
                    account_id = %account_id,
                    transaction_id = %tx.transaction_id,
                    anomaly_id = %record.anomaly_id,
                    risk_score = score,
                    risk_level = ?risk_level,
                    "Anomaly recorded"
                );
                anomalies += 1;
            }
        }

        self.storage.clear_pending_processing(account_id).await?;
        self.metrics.record_account(start.elapsed(), &scores, anomalies);

        info!(
            account_id = %account_id,
            transactions = transactions.len(),
            anomalies = anomalies,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Account processed"
        );

        Ok(AccountOutcome::Processed {
            transactions: transactions.len(),
            anomalies,
        })
    }

    /// Fitting is CPU bound, so it runs on the blocking pool.
    async fn fit_predict(
        &self,
        features: FeatureMatrix,
    ) -> PipelineResult<(FeatureMatrix, ModelOutput)> {
        let detector = self.detector.clone();
        let (features, output) = tokio::task::spawn_blocking(move || {
            let output = detector.fit_predict(&features);
            (features, output)
        })
        .await
        .map_err(|e| PipelineError::ModelFit(ModelFitError::Aborted(e.to_string())))?;

        Ok((features, output?))
    }
}
