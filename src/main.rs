//! Fraud Batch Trainer - Main Entry Point
//!
//! Runs one training pipeline per CSV file given on the command line and
//! prints one JSON result line per file. Independent runs execute in parallel.

use anyhow::{Context, Result};
use fraud_batch_trainer::{
    config::AppConfig, metrics::PipelineMetrics, pipeline::FraudPipeline, ModelBundle,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    // results go to stdout, logs to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config)?;

    let files: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if files.is_empty() {
        anyhow::bail!("usage: fraud-batch-trainer <transactions.csv>...");
    }

    info!(
        files = files.len(),
        workers = config.pipeline.workers,
        seed = config.split.seed,
        train_fraction = config.split.train_fraction,
        "Starting Fraud Batch Trainer"
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = Arc::new(FraudPipeline::from_config(&config).with_metrics(metrics.clone()));

    // Loaded once so every run in this invocation predicts with the same pair
    let reuse_bundle: Option<Arc<ModelBundle>> = match (config.persistence.reuse, pipeline.store()) {
        (true, Some(store)) => match store.load()? {
            Some(bundle) => {
                info!(run_id = %bundle.run_id, created_at = %bundle.created_at, "Reusing persisted model bundle");
                Some(Arc::new(bundle))
            }
            None => {
                warn!("No persisted model bundle found, training from scratch");
                None
            }
        },
        _ => None,
    };

    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers));
    let mut handles = Vec::with_capacity(files.len());

    for file in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let pipeline = pipeline.clone();
        let reuse_bundle = reuse_bundle.clone();

        handles.push(tokio::task::spawn_blocking(move || {
            let outcome = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))
                .map(|bytes| match &reuse_bundle {
                    Some(bundle) => pipeline.run_with_bundle(&bytes, bundle),
                    None => pipeline.run(&bytes),
                });
            drop(permit);
            (file, outcome)
        }));
    }

    let mut failures = 0usize;
    for result in futures::future::join_all(handles).await {
        let (file, outcome) = result.context("Pipeline task panicked")?;
        let line = match outcome {
            Ok(Ok(report)) => json!({
                "file": file.display().to_string(),
                "summary": report.summary,
            }),
            Ok(Err(run_error)) => {
                failures += 1;
                json!({
                    "file": file.display().to_string(),
                    "error_kind": run_error.kind(),
                    "message": run_error.source.to_string(),
                })
            }
            Err(read_error) => {
                failures += 1;
                error!(file = %file.display(), error = %read_error, "Could not read input");
                json!({
                    "file": file.display().to_string(),
                    "error_kind": "IoError",
                    "message": format!("{:#}", read_error),
                })
            }
        };
        println!("{}", line);
    }

    metrics.print_summary();

    if failures > 0 {
        anyhow::bail!("{} run(s) failed", failures);
    }
    Ok(())
}
