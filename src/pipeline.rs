//! Run orchestration: load → split → scale → fit → predict → evaluate → persist.
//!
//! Every run owns its dataset, split, scaling parameters and model. The only
//! state shared between runs is the optional [`ArtifactStore`], whose writes
//! are atomic.

use crate::config::{AppConfig, ZeroVariancePolicy};
use crate::error::{PipelineError, RunError};
use crate::loader::{load_dataset, LoaderOptions};
use crate::metrics::PipelineMetrics;
use crate::models::logistic::LogisticRegression;
use crate::models::store::{ArtifactStore, ModelBundle};
use crate::scaler::ScalingParameters;
use crate::split::train_test_split;
use crate::types::summary::{EvaluationReport, PredictionSummary};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of one run. Transitions are strictly sequential; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Loaded,
    Split,
    Scaled,
    Fitted,
    Evaluated,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Loaded => "loaded",
            PipelineState::Split => "split",
            PipelineState::Scaled => "scaled",
            PipelineState::Fitted => "fitted",
            PipelineState::Evaluated => "evaluated",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a run, independent of where they came from.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub loader: LoaderOptions,
    pub train_fraction: f64,
    pub seed: u64,
    pub zero_variance: ZeroVariancePolicy,
    pub classifier: LogisticRegression,
    /// Fraud probability threshold used for predictions
    pub threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            loader: LoaderOptions::from(&config.dataset),
            train_fraction: config.split.train_fraction,
            seed: config.split.seed,
            zero_variance: config.scaler.zero_variance,
            classifier: LogisticRegression::from(&config.model),
            threshold: config.model.threshold,
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Record returned to the caller
    pub summary: PredictionSummary,
    pub evaluation: EvaluationReport,
    /// Scaler and model the predictions were made with
    pub bundle: ModelBundle,
    /// False when a persisted bundle was reused instead of fitting
    pub retrained: bool,
    /// Where the fitted bundle was saved, if persistence is enabled
    pub bundle_path: Option<PathBuf>,
    /// States visited, in order
    pub history: Vec<PipelineState>,
}

/// Tracks the state of one run and attaches run context to failures.
struct RunTracker<'a> {
    run_id: Uuid,
    state: PipelineState,
    history: Vec<PipelineState>,
    metrics: Option<&'a PipelineMetrics>,
    stage_start: Instant,
}

impl<'a> RunTracker<'a> {
    fn start(metrics: Option<&'a PipelineMetrics>) -> Self {
        let run_id = Uuid::new_v4();
        if let Some(m) = metrics {
            m.record_start();
        }
        Self {
            run_id,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
            metrics,
            stage_start: Instant::now(),
        }
    }

    fn advance(&mut self, next: PipelineState) {
        let elapsed = self.stage_start.elapsed();
        if let Some(m) = self.metrics {
            m.record_stage(next.as_str(), elapsed);
        }
        debug!(
            run_id = %self.run_id,
            from = %self.state,
            to = %next,
            elapsed_us = elapsed.as_micros() as u64,
            "Pipeline state transition"
        );
        self.state = next;
        self.history.push(next);
        self.stage_start = Instant::now();
    }

    fn fail(&mut self, source: PipelineError) -> RunError {
        let stage = self.state;
        warn!(
            run_id = %self.run_id,
            stage = %stage,
            kind = source.kind(),
            error = %source,
            "Pipeline run failed"
        );
        if let Some(m) = self.metrics {
            m.record_failure(source.kind());
        }
        self.state = PipelineState::Failed;
        self.history.push(PipelineState::Failed);
        RunError {
            run_id: self.run_id,
            stage,
            source,
        }
    }
}

/// Sequences the pipeline components for one uploaded dataset at a time.
#[derive(Clone, Default)]
pub struct FraudPipeline {
    settings: PipelineSettings,
    store: Option<ArtifactStore>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl FraudPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            store: None,
            metrics: None,
        }
    }

    /// Build from configuration; persistence follows `persistence.enabled`.
    pub fn from_config(config: &AppConfig) -> Self {
        let pipeline = Self::new(PipelineSettings::from(config));
        if config.persistence.enabled {
            pipeline.with_store(ArtifactStore::new(&config.persistence.dir))
        } else {
            pipeline
        }
    }

    /// Save each fitted bundle to `store`.
    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    /// Train on the uploaded dataset and summarise predictions for its held-out rows.
    pub fn run(&self, input: &[u8]) -> Result<RunReport, RunError> {
        self.execute(input, None)
    }

    /// Predict the held-out rows with a previously fitted bundle instead of refitting.
    ///
    /// The input is loaded and split exactly as in [`run`](Self::run); the
    /// bundle must have been fitted on the same feature columns.
    pub fn run_with_bundle(&self, input: &[u8], bundle: &ModelBundle) -> Result<RunReport, RunError> {
        self.execute(input, Some(bundle))
    }

    fn execute(&self, input: &[u8], reuse: Option<&ModelBundle>) -> Result<RunReport, RunError> {
        let settings = &self.settings;
        let mut tracker = RunTracker::start(self.metrics.as_deref());
        info!(
            run_id = %tracker.run_id,
            bytes = input.len(),
            reuse = reuse.is_some(),
            "Pipeline run started"
        );

        let dataset = load_dataset(input, &settings.loader).map_err(|e| tracker.fail(e))?;
        if let Some(bundle) = reuse {
            bundle
                .validate()
                .and_then(|_| bundle.scaling.check_schema(&dataset.features.columns))
                .map_err(|e| tracker.fail(e))?;
        }
        tracker.advance(PipelineState::Loaded);

        let split = train_test_split(&dataset, settings.train_fraction, settings.seed)
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(PipelineState::Split);

        let (bundle, test_scaled, retrained) = match reuse {
            Some(bundle) => {
                let test_scaled = bundle
                    .scaling
                    .transform(&split.test.features)
                    .map_err(|e| tracker.fail(e))?;
                tracker.advance(PipelineState::Scaled);
                (bundle.clone(), test_scaled, false)
            }
            None => {
                let (scaling, train_scaled) =
                    ScalingParameters::fit_transform(&split.train.features, settings.zero_variance)
                        .map_err(|e| tracker.fail(e))?;
                let test_scaled = scaling
                    .transform(&split.test.features)
                    .map_err(|e| tracker.fail(e))?;
                tracker.advance(PipelineState::Scaled);

                let model = settings
                    .classifier
                    .fit(&train_scaled, &split.train.labels)
                    .map_err(|e| tracker.fail(e))?;
                tracker.advance(PipelineState::Fitted);

                let bundle = ModelBundle::new(tracker.run_id, scaling, model);
                (bundle, test_scaled, true)
            }
        };

        let predicted = bundle
            .model
            .predict_with_threshold(&test_scaled, settings.threshold)
            .map_err(|e| tracker.fail(e))?;
        let truth = &split.test.labels;
        let summary =
            PredictionSummary::from_predictions(&predicted, truth).map_err(|e| tracker.fail(e))?;
        let evaluation =
            EvaluationReport::from_predictions(&predicted, truth).map_err(|e| tracker.fail(e))?;
        tracker.advance(PipelineState::Evaluated);

        // only a fully evaluated, freshly fitted pair is persisted
        let bundle_path = match (&self.store, retrained) {
            (Some(store), true) => Some(store.save(&bundle).map_err(|e| tracker.fail(e))?),
            _ => None,
        };

        tracker.advance(PipelineState::Done);
        if let Some(m) = &self.metrics {
            m.record_success(summary.total_transactions);
        }

        info!(
            run_id = %tracker.run_id,
            total = summary.total_transactions,
            predicted_fraud = summary.fraudulent_cases,
            fraud_percentage = summary.fraud_percentage,
            actual_fraud = evaluation.confusion.actual_positives(),
            recall = evaluation.recall,
            retrained,
            "Pipeline run complete"
        );

        Ok(RunReport {
            run_id: tracker.run_id,
            summary,
            evaluation,
            bundle,
            retrained,
            bundle_path,
            history: tracker.history,
        })
    }
}
