//! Feature standardization fitted on the training subset

use crate::config::ZeroVariancePolicy;
use crate::error::{PipelineError, Result};
use crate::types::dataset::FeatureMatrix;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-column mean and standard deviation, plus the schema they were fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
    /// Feature column names in fitted order
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    /// Divisor per column; zero-variance columns hold the fallback 1.0
    pub std: Vec<f64>,
}

/// Features standardized with a [`ScalingParameters`]; the only input the classifier accepts.
///
/// Built only by [`ScalingParameters::transform`], so holding one means the
/// values have been through a fitted scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFeatures {
    pub(crate) columns: Vec<String>,
    pub(crate) values: Array2<f64>,
}

impl ScaledFeatures {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
}

impl ScalingParameters {
    /// Fit population mean and standard deviation (ddof = 0) per column.
    pub fn fit(train: &FeatureMatrix, policy: ZeroVariancePolicy) -> Result<Self> {
        if train.n_rows() == 0 {
            return Err(PipelineError::InsufficientData(
                "cannot fit scaling parameters on zero rows".to_string(),
            ));
        }

        let mean = train
            .values
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::InsufficientData("empty feature matrix".to_string()))?;
        let raw_std = train.values.std_axis(Axis(0), 0.0);

        let mut std = Vec::with_capacity(raw_std.len());
        for (column, &s) in train.columns.iter().zip(raw_std.iter()) {
            if s > 0.0 {
                std.push(s);
                continue;
            }
            match policy {
                ZeroVariancePolicy::Unit => {
                    debug!(column = %column, "Zero-variance column, scaling by 1.0");
                    std.push(1.0);
                }
                ZeroVariancePolicy::Reject => {
                    return Err(PipelineError::ZeroVariance {
                        column: column.clone(),
                    });
                }
            }
        }

        Ok(Self {
            columns: train.columns.clone(),
            mean: mean.to_vec(),
            std,
        })
    }

    /// Number of feature columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Fail unless `columns` equals the fitted schema, name for name and in order.
    pub fn check_schema(&self, columns: &[String]) -> Result<()> {
        if self.columns.as_slice() != columns {
            return Err(PipelineError::SchemaMismatch {
                expected: self.columns.clone(),
                found: columns.to_vec(),
            });
        }
        Ok(())
    }

    /// Apply `(x - mean) / std` to every row of `features`.
    pub fn transform(&self, features: &FeatureMatrix) -> Result<ScaledFeatures> {
        self.check_schema(&features.columns)?;

        let mut values = features.values.clone();
        for (j, mut column) in values.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std) = (self.mean[j], self.std[j]);
            column.mapv_inplace(|x| (x - mean) / std);
        }

        Ok(ScaledFeatures {
            columns: features.columns.clone(),
            values,
        })
    }

    /// Fit on `train` and transform it in one step.
    pub fn fit_transform(
        train: &FeatureMatrix,
        policy: ZeroVariancePolicy,
    ) -> Result<(Self, ScaledFeatures)> {
        let params = Self::fit(train, policy)?;
        let scaled = params.transform(train)?;
        Ok((params, scaled))
    }
}
