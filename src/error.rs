//! Error types for the training pipeline

use crate::pipeline::PipelineState;
use uuid::Uuid;

/// Failure raised by one of the pipeline components.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Input could not be parsed as a rectangular numeric table.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The label column is not in the header.
    #[error("The file must contain a '{column}' column")]
    MissingLabelColumn {
        /// Expected label column name.
        column: String,
    },

    /// Not enough rows (or classes) to form the requested partition.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Feature columns differ from the schema the parameters were fitted on.
    #[error("Schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A training column has zero standard deviation.
    #[error("Feature column '{column}' has zero variance in the training subset")]
    ZeroVariance { column: String },

    /// Classifier optimisation did not converge within its budget.
    #[error("Classifier did not converge after {iterations} iterations: {reason}")]
    Convergence { iterations: usize, reason: String },

    /// Prediction and truth sequences differ in length.
    #[error("Length mismatch: {predicted} predictions for {actual} labels")]
    LengthMismatch { predicted: usize, actual: usize },

    /// Persisted bundle is unusable.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid pipeline parameter.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Stable name of the error kind, for the presentation layer.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MalformedInput(_) => "MalformedInputError",
            PipelineError::MissingLabelColumn { .. } => "MissingLabelColumnError",
            PipelineError::InsufficientData(_) => "InsufficientDataError",
            PipelineError::SchemaMismatch { .. } => "SchemaMismatchError",
            PipelineError::ZeroVariance { .. } => "ZeroVarianceError",
            PipelineError::Convergence { .. } => "ConvergenceError",
            PipelineError::LengthMismatch { .. } => "LengthMismatchError",
            PipelineError::Persistence(_) => "PersistenceError",
            PipelineError::Io(_) => "IoError",
            PipelineError::Serialization(_) => "SerializationError",
            PipelineError::Config(_) => "ConfigError",
        }
    }
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        match e.kind() {
            csv::ErrorKind::Io(_) => PipelineError::MalformedInput(format!("read failed: {}", e)),
            _ => PipelineError::MalformedInput(e.to_string()),
        }
    }
}

/// Convenience alias for `std::result::Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A component failure with the context of the run it aborted.
#[derive(thiserror::Error, Debug)]
#[error("run {run_id} failed after reaching {stage}: {source}")]
pub struct RunError {
    pub run_id: Uuid,
    /// Last state the run reached before failing.
    pub stage: PipelineState,
    #[source]
    pub source: PipelineError,
}

impl RunError {
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }
}
