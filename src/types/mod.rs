//! Type definitions for the training pipeline

pub mod dataset;
pub mod summary;

pub use dataset::{Dataset, FeatureMatrix};
pub use summary::{ConfusionCounts, EvaluationReport, PredictionSummary};
