//! Dataset loading from an uploaded CSV byte stream.
//!
//! The header names the columns; the label column is separated out and every
//! other column becomes a numeric feature, in header order.

use crate::config::DatasetConfig;
use crate::error::{PipelineError, Result};
use crate::types::dataset::{Dataset, FeatureMatrix};
use csv::{ReaderBuilder, Trim};
use ndarray::Array2;
use std::collections::HashSet;
use tracing::debug;

/// Parsing options for the loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Ground-truth column name
    pub label_column: String,
    pub delimiter: u8,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            label_column: "Class".to_string(),
            delimiter: b',',
        }
    }
}

impl From<&DatasetConfig> for LoaderOptions {
    fn from(config: &DatasetConfig) -> Self {
        Self {
            label_column: config.label_column.clone(),
            delimiter: config.delimiter.bytes().next().unwrap_or(b','),
        }
    }
}

/// Parse `input` into a [`Dataset`].
pub fn load_dataset(input: &[u8], options: &LoaderOptions) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);

    let raw_header = reader.headers()?;
    if raw_header.is_empty() || raw_header.iter().all(str::is_empty) {
        return Err(PipelineError::MalformedInput(
            "missing header row".to_string(),
        ));
    }

    // unnamed columns (e.g. a written-out row index) are named by position
    let header: Vec<String> = raw_header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut seen = HashSet::new();
    for name in &header {
        if !seen.insert(name.as_str()) {
            return Err(PipelineError::MalformedInput(format!(
                "duplicate column '{}'",
                name
            )));
        }
    }

    let label_idx = header
        .iter()
        .position(|name| name == &options.label_column)
        .ok_or_else(|| PipelineError::MissingLabelColumn {
            column: options.label_column.clone(),
        })?;

    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != label_idx)
        .map(|(_, name)| name.clone())
        .collect();
    if columns.is_empty() {
        return Err(PipelineError::MalformedInput(
            "no feature columns besides the label".to_string(),
        ));
    }

    let mut values = Vec::new();
    let mut labels = Vec::new();

    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = row_idx + 2;

        if record.len() != header.len() {
            return Err(PipelineError::MalformedInput(format!(
                "line {}: expected {} fields, found {}",
                line,
                header.len(),
                record.len()
            )));
        }

        for (col_idx, field) in record.iter().enumerate() {
            let value = parse_cell(field, line, &header[col_idx])?;
            if col_idx == label_idx {
                labels.push(parse_label(value, line, &header[col_idx])?);
            } else {
                values.push(value);
            }
        }
    }

    let n_rows = labels.len();
    let values = Array2::from_shape_vec((n_rows, columns.len()), values)
        .map_err(|e| PipelineError::MalformedInput(e.to_string()))?;

    debug!(
        rows = n_rows,
        features = columns.len(),
        label_column = %options.label_column,
        "Dataset parsed"
    );

    Ok(Dataset {
        label_column: options.label_column.clone(),
        features: FeatureMatrix::new(columns, values),
        labels,
    })
}

fn parse_cell(field: &str, line: usize, column: &str) -> Result<f64> {
    let value: f64 = field.parse().map_err(|_| {
        PipelineError::MalformedInput(format!(
            "line {}: column '{}' has non-numeric value '{}'",
            line, column, field
        ))
    })?;

    if !value.is_finite() {
        return Err(PipelineError::MalformedInput(format!(
            "line {}: column '{}' has non-finite value '{}'",
            line, column, field
        )));
    }

    Ok(value)
}

fn parse_label(value: f64, line: usize, column: &str) -> Result<u8> {
    if value == 0.0 {
        Ok(0)
    } else if value == 1.0 {
        Ok(1)
    } else {
        Err(PipelineError::MalformedInput(format!(
            "line {}: label column '{}' must be 0 or 1, found {}",
            line, column, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(input: &str) -> Result<Dataset> {
        load_dataset(input.as_bytes(), &LoaderOptions::default())
    }

    #[test]
    fn test_load_separates_label() {
        let dataset = load("Time,Amount,Class\n0,12.5,0\n1,900.0,1\n2,3.25,0\n").unwrap();

        assert_eq!(dataset.n_rows(), 3);
        assert_eq!(dataset.features.columns, vec!["Time", "Amount"]);
        assert_eq!(dataset.labels, vec![0, 1, 0]);
        assert_eq!(dataset.features.values[[1, 1]], 900.0);
        assert_eq!(dataset.positive_count(), 1);
    }

    #[test]
    fn test_label_column_anywhere_in_header() {
        let dataset = load("Class,V1,V2\n1,0.5,-0.5\n0,1.5,2.0\n").unwrap();

        assert_eq!(dataset.features.columns, vec!["V1", "V2"]);
        assert_eq!(dataset.features.values[[0, 0]], 0.5);
        assert_eq!(dataset.labels, vec![1, 0]);
    }

    #[test]
    fn test_missing_label_column() {
        let err = load("V1,V2,Label\n1,2,0\n").unwrap_err();
        assert!(matches!(err, PipelineError::MissingLabelColumn { ref column } if column == "Class"));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = load("V1,V2,Class\n1,2,0\n3,1\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = load("V1,Class\nabc,0\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");

        let err = load("V1,Class\n,0\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");

        let err = load("V1,Class\nNaN,0\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let err = load("V1,Class\n1.0,2\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");
    }

    #[test]
    fn test_float_labels_accepted() {
        let dataset = load("V1,Class\n1.0,1.0\n2.0,0.0\n").unwrap();
        assert_eq!(dataset.labels, vec![1, 0]);
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = load("V1,V1,Class\n1,2,0\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");
    }

    #[test]
    fn test_unnamed_index_column_kept_as_feature() {
        let dataset = load(",V1,Amount,Class\n0,0.5,10.0,0\n1,-0.5,20.0,1\n").unwrap();

        assert_eq!(dataset.features.columns, vec!["Unnamed: 0", "V1", "Amount"]);
        assert_eq!(dataset.features.values[[1, 0]], 1.0);
        assert_eq!(dataset.labels, vec![0, 1]);
    }

    #[test]
    fn test_unnamed_columns_named_by_position() {
        let dataset = load("V1,,Class,\n1,2,0,3\n").unwrap();
        assert_eq!(dataset.features.columns, vec!["V1", "Unnamed: 1", "Unnamed: 3"]);

        // clashes with an explicit name are still duplicates
        let err = load("Unnamed: 1,,Class\n1,2,0\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");
    }

    #[test]
    fn test_label_only_rejected() {
        let err = load("Class\n0\n1\n").unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");
    }

    #[test]
    fn test_whitespace_and_delimiter() {
        let options = LoaderOptions {
            label_column: "Class".to_string(),
            delimiter: b';',
        };
        let dataset = load_dataset(b" V1 ; Class \n 1.5 ; 1 \n", &options).unwrap();

        assert_eq!(dataset.features.columns, vec!["V1"]);
        assert_eq!(dataset.labels, vec![1]);
    }

    #[test]
    fn test_header_only_gives_empty_dataset() {
        let dataset = load("V1,Class\n").unwrap();
        assert_eq!(dataset.n_rows(), 0);
        assert_eq!(dataset.features.n_features(), 1);
    }
}
