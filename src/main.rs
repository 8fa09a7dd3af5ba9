//! Account Anomaly Pipeline - Main Entry Point
//!
//! Waits for invocation events on NATS, runs batch anomaly detection over
//! pending accounts, and publishes the run result.

use account_anomaly_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::TriggerConsumer,
    feature_extractor::FeatureExtractor,
    handler::{InvocationHandler, InvocationResponse},
    health::HealthChecker,
    metrics::PipelineMetrics,
    models::detector::AnomalyDetector,
    normalizer::ScoreNormalizer,
    orchestrator::AnomalyPipeline,
    producer::ResultProducer,
    storage,
    types::event::{ErrorResponse, InvocationEvent},
};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("account_anomaly_pipeline={}", logging.level)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "pretty" {
        builder.pretty().init();
    } else {
        builder.json().init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!(
        service = %config.service.name,
        environment = %config.service.environment,
        "Starting Account Anomaly Pipeline"
    );

    config.validate()?;
    info!(
        backend = ?config.storage.backend,
        workers = config.pipeline.workers,
        transaction_limit = config.pipeline.transaction_limit,
        "Configuration loaded successfully"
    );

    let storage = storage::connect(&config)
        .await
        .context("Failed to initialise storage")?;

    // Initialize components
    let feature_extractor = FeatureExtractor::new();
    info!(
        "Feature extractor initialized ({} features)",
        feature_extractor.feature_count()
    );

    let detector = AnomalyDetector::new(&config.model);
    info!(
        model_version = %detector.model_version(),
        n_estimators = config.model.n_estimators,
        contamination = config.model.contamination,
        "Anomaly detector initialized"
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = AnomalyPipeline::new(
        storage.clone(),
        feature_extractor,
        detector,
        ScoreNormalizer::new(config.scoring.clone()),
        metrics.clone(),
        config.pipeline.clone(),
    );

    let config = Arc::new(config);
    let health = HealthChecker::new(config.clone(), storage);
    let handler = InvocationHandler::new(pipeline, health, &config.service.name);

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TriggerConsumer::new(client.clone(), &config.nats);
    let producer = ResultProducer::new(client.clone(), &config.nats.result_subject);
    info!("Publishing results to: {}", producer.subject());

    // Runs are serialized: one invocation at a time
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let response = match InvocationEvent::from_payload(&message.payload) {
            Ok(event) => handler.handle(&event).await,
            Err(e) => {
                warn!(error = %e, "Failed to deserialize invocation event");
                InvocationResponse::Failed(ErrorResponse::internal(
                    format!("invalid invocation event: {e}"),
                    &config.service.name,
                ))
            }
        };

        let status_code = response.status_code();
        let published = match &response {
            InvocationResponse::Health(report) => match message.reply.clone() {
                Some(reply) => producer.reply(report, reply).await,
                None => {
                    info!(status = ?report.status, "Health check without reply subject");
                    Ok(())
                }
            },
            other => producer.publish(other, message.reply.clone()).await,
        };

        match published {
            Ok(()) => info!(status_code, "Invocation handled"),
            Err(e) => error!(error = %e, "Failed to publish invocation response"),
        }
    }

    // Print final summary
    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
