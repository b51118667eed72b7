//! In-memory transaction table

use ndarray::{Array2, Axis};

/// Numeric feature columns, row-aligned with a label vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    /// Column names in header order (label column excluded)
    pub columns: Vec<String>,
    /// Values, one row per transaction
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!(columns.len(), values.ncols());
        Self { columns, values }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }
}

/// Parsed transaction dataset: features plus a binary label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Name of the label column the labels were read from
    pub label_column: String,
    pub features: FeatureMatrix,
    /// 1 = fraud, 0 = genuine
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    /// Count of rows labelled fraud.
    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Subset of rows at `indices`.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            label_column: self.label_column.clone(),
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}
