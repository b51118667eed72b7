//! Configuration management for the training pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// What to do with a feature column whose training standard deviation is zero
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZeroVariancePolicy {
    /// Divide by 1.0 instead, so the column becomes all zeros after centering
    #[default]
    Unit,
    /// Fail the run with a zero-variance error
    Reject,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub dataset: DatasetConfig,
    pub split: SplitConfig,
    pub scaler: ScalerConfig,
    pub model: ModelConfig,
    pub persistence: PersistenceConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Input table layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Name of the ground-truth column (1 = fraud, 0 = genuine)
    pub label_column: String,
    /// Field delimiter, a single ASCII character
    pub delimiter: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            label_column: "Class".to_string(),
            delimiter: ",".to_string(),
        }
    }
}

/// Train/test partition settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows used for training
    pub train_fraction: f64,
    /// Shuffle seed; identical input and seed give identical partitions
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScalerConfig {
    pub zero_variance: ZeroVariancePolicy,
}

/// Logistic regression settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Newton iteration budget
    pub max_iter: usize,
    /// Converged once every parameter moves less than this in one step
    pub tolerance: f64,
    /// Inverse L2 regularisation strength (larger = weaker penalty)
    pub regularization: f64,
    /// Probability at or above which a row is predicted fraud
    pub threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-8,
            regularization: 1.0,
            threshold: 0.5,
        }
    }
}

/// Model bundle persistence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Save the fitted scaler and model after each training run
    pub enabled: bool,
    /// Directory holding the bundle
    pub dir: String,
    /// Predict with the persisted bundle instead of refitting, when one exists
    pub reuse: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "artifacts".to_string(),
            reuse: false,
        }
    }
}

/// Run scheduling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of runs executing at once
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the path in `FRAUD_TRAINER_CONFIG`, or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var("FRAUD_TRAINER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults; `FRAUD_TRAINER__<SECTION>__<KEY>`
    /// environment variables override file values.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("FRAUD_TRAINER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let split = &self.split;
        if !(split.train_fraction > 0.0 && split.train_fraction < 1.0) {
            anyhow::bail!(
                "split.train_fraction must be in (0, 1), got {}",
                split.train_fraction
            );
        }
        if self.model.max_iter == 0 {
            anyhow::bail!("model.max_iter must be at least 1");
        }
        if !(self.model.tolerance > 0.0) {
            anyhow::bail!("model.tolerance must be positive");
        }
        if !(self.model.regularization > 0.0) {
            anyhow::bail!("model.regularization must be positive");
        }
        if !(0.0..=1.0).contains(&self.model.threshold) {
            anyhow::bail!("model.threshold must be in [0, 1]");
        }
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        if self.dataset.delimiter.len() != 1 || !self.dataset.delimiter.is_ascii() {
            anyhow::bail!("dataset.delimiter must be a single ASCII character");
        }
        if self.dataset.label_column.trim().is_empty() {
            anyhow::bail!("dataset.label_column must not be empty");
        }
        Ok(())
    }
}
