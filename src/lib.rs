//! Fraud Batch Trainer Library
//!
//! Trains a logistic fraud classifier on an uploaded transaction CSV and
//! summarises its predictions for a deterministic held-out split.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod scaler;
pub mod split;
pub mod types;

pub use config::AppConfig;
pub use error::{PipelineError, RunError};
pub use loader::{load_dataset, LoaderOptions};
pub use models::{ArtifactStore, LogisticRegression, ModelBundle, ModelState};
pub use pipeline::{FraudPipeline, PipelineState, RunReport};
pub use scaler::{ScaledFeatures, ScalingParameters};
pub use split::{train_test_split, Split};
pub use types::{Dataset, FeatureMatrix, PredictionSummary};
