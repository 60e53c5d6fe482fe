//! Theft Detection Engine - Main Entry Point
//!
//! Consumes batch scoring requests from NATS, scores every consumer row
//! with the detector ensemble and publishes batch reports. Requests are
//! processed in parallel with bounded concurrency.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use theft_detection_engine::{
    config::AppConfig,
    consumer::RequestConsumer,
    ingest,
    metrics::{MetricsReporter, ScoringMetrics},
    models::{ArtifactLoader, EnsembleCombiner, OnnxDetectorSuite},
    producer::ReportProducer,
    scoring::TheftScorer,
    store::ReportStore,
    types::prediction::BatchReport,
    ScoringRequest,
};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("theft_detection_engine=info".parse()?),
        )
        .init();

    info!("Starting Theft Detection Engine");

    let config = AppConfig::load()?;
    info!(
        decision_threshold = config.models.decision_threshold,
        workers = config.pipeline.workers,
        "Configuration loaded"
    );

    // Load model artifacts once into read-only shared state. Classifier or
    // scaler failures abort startup; a missing sequence model only switches
    // that adapter into fallback mode.
    let loader = ArtifactLoader::new(
        &config.models.models_dir,
        &config.models.scalers_dir,
        config.models.onnx_threads,
    )
    .context("Failed to initialize the model runtime")?;

    let suite = OnnxDetectorSuite::load(&loader).context("Failed to load detector artifacts")?;
    let combiner = EnsembleCombiner::new(
        config.models.weights.clone(),
        config.models.decision_threshold,
    )?;

    let scorer = Arc::new(TheftScorer::new(
        suite,
        combiner,
        config.detection.risk_levels.clone(),
    ));
    info!(
        sequence_model = scorer.sequence_available(),
        "Scoring engine initialized"
    );

    let metrics = Arc::new(ScoringMetrics::new());
    let store = Arc::new(ReportStore::new(config.pipeline.report_history));

    let client = async_nats::connect(&config.nats.url).await?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let producer = Arc::new(ReportProducer::new(
        client.clone(),
        &config.nats.report_subject,
    ));

    // Start the periodic metrics reporter.
    let reporter_metrics = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(reporter_metrics, 30);
        reporter.start().await;
    });

    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers));
    let batch_timeout = Duration::from_millis(config.pipeline.timeout_ms);

    info!(
        request_subject = %config.nats.request_subject,
        report_subject = %config.nats.report_subject,
        "Entering request loop"
    );

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let scorer = scorer.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let store = store.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let request = match serde_json::from_slice::<ScoringRequest>(&message.payload) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize scoring request");
                    drop(permit);
                    return;
                }
            };

            let request_id = request.request_id.clone();
            let records = match ingest::parse_table(&request.columns, &request.rows) {
                Ok(records) => records,
                Err(e) => {
                    warn!(request_id = ?request_id, error = %e, "Rejected scoring request");
                    drop(permit);
                    return;
                }
            };

            // Scoring is synchronous CPU-bound work; run it off the async
            // runtime and bound it with the caller-level batch timeout.
            let batch_scorer = scorer.clone();
            let scoring_task =
                tokio::task::spawn_blocking(move || batch_scorer.score_batch(&records));

            let (results, summary) = match tokio::time::timeout(batch_timeout, scoring_task).await
            {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    error!(request_id = ?request_id, error = %e, "Batch scoring task failed");
                    drop(permit);
                    return;
                }
                Err(_) => {
                    error!(
                        request_id = ?request_id,
                        timeout_ms = batch_timeout.as_millis() as u64,
                        "Batch scoring timed out"
                    );
                    drop(permit);
                    return;
                }
            };

            let processing_time = start_time.elapsed();
            metrics.record_batch(processing_time, &results);

            let report = BatchReport::new(request_id, results, summary, scorer.threshold());
            let report = store.push(report);

            if let Err(e) = producer.publish(&report).await {
                error!(report_id = %report.report_id, error = %e, "Failed to publish batch report");
            } else {
                info!(
                    report_id = %report.report_id,
                    consumers = report.summary.total,
                    theft_detected = report.summary.theft_detected,
                    processing_time_ms = processing_time.as_millis() as u64,
                    "Batch report published"
                );
            }

            drop(permit);
        });
    }

    info!("Request stream closed, shutting down");
    metrics.print_summary();

    Ok(())
}
