//! Result records returned to the caller

use serde::{Deserialize, Serialize};

/// Aggregate prediction statistics for the held-out subset.
///
/// `fraudulent_cases` counts rows *predicted* as fraud, not confirmed frauds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    /// Rows evaluated
    pub total_transactions: usize,

    /// Rows predicted fraudulent
    pub fraudulent_cases: usize,

    /// `fraudulent_cases / total_transactions * 100`, rounded to 2 decimals
    pub fraud_percentage: f64,

    /// Rows predicted genuine
    pub genuine_cases: usize,
}

/// Confusion counts for the fraud class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    /// Rows actually labelled fraud.
    pub fn actual_positives(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// Classification quality on the held-out subset, alongside the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub confusion: ConfusionCounts,
    pub accuracy: f64,
    /// Precision for the fraud class; 0 when nothing was predicted fraud
    pub precision: f64,
    /// Recall for the fraud class; 0 when the subset holds no fraud
    pub recall: f64,
    pub f1: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_serialization() {
        let summary = PredictionSummary {
            total_transactions: 2,
            fraudulent_cases: 0,
            fraud_percentage: 0.0,
            genuine_cases: 2,
        };

        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["total_transactions"], 2);
        assert_eq!(json["fraudulent_cases"], 0);
        assert_eq!(json["fraud_percentage"], 0.0);
        assert_eq!(json["genuine_cases"], 2);
    }

    #[test]
    fn test_confusion_totals() {
        let counts = ConfusionCounts {
            true_positives: 2,
            false_positives: 1,
            true_negatives: 6,
            false_negatives: 1,
        };

        assert_eq!(counts.actual_positives(), 3);
        assert_eq!(counts.total(), 10);
    }
}
