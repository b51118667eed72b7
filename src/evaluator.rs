//! Held-out evaluation: prediction summary and classification report

use crate::error::{PipelineError, Result};
use crate::types::summary::{ConfusionCounts, EvaluationReport, PredictionSummary};

/// Round to two decimal places, resolving exact ties to the even digit.
///
/// Ties are judged on the exact value of `value`, not on the rounded product
/// `value * 100.0`: 0.625 is a tie and becomes 0.62, while 2.675 (stored as
/// 2.67499...) is not and becomes 2.67.
fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    // exact error of the multiplication
    let residual = value.mul_add(100.0, -scaled);
    let floor = scaled.floor();

    let rounded = if scaled - floor != 0.5 {
        scaled.round()
    } else if residual > 0.0 {
        floor + 1.0
    } else if residual < 0.0 {
        floor
    } else {
        scaled.round_ties_even()
    };
    rounded / 100.0
}

fn check_lengths(predicted: &[u8], truth: &[u8]) -> Result<()> {
    if predicted.len() != truth.len() {
        return Err(PipelineError::LengthMismatch {
            predicted: predicted.len(),
            actual: truth.len(),
        });
    }
    if predicted.is_empty() {
        return Err(PipelineError::InsufficientData(
            "no predictions to evaluate".to_string(),
        ));
    }
    Ok(())
}

impl PredictionSummary {
    /// Summarise predictions for a held-out subset.
    ///
    /// `truth` only participates in the length check: the fraud count is the
    /// number of rows *predicted* fraudulent.
    pub fn from_predictions(predicted: &[u8], truth: &[u8]) -> Result<Self> {
        check_lengths(predicted, truth)?;

        let total = predicted.len();
        let fraudulent = predicted.iter().filter(|&&p| p == 1).count();

        Ok(Self {
            total_transactions: total,
            fraudulent_cases: fraudulent,
            fraud_percentage: round2(100.0 * fraudulent as f64 / total as f64),
            genuine_cases: total - fraudulent,
        })
    }
}

impl ConfusionCounts {
    pub fn from_predictions(predicted: &[u8], truth: &[u8]) -> Result<Self> {
        check_lengths(predicted, truth)?;

        let mut counts = Self::default();
        for (&p, &t) in predicted.iter().zip(truth) {
            match (p == 1, t == 1) {
                (true, true) => counts.true_positives += 1,
                (true, false) => counts.false_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (false, true) => counts.false_negatives += 1,
            }
        }
        Ok(counts)
    }
}

impl EvaluationReport {
    /// Accuracy plus precision, recall and F1 for the fraud class.
    pub fn from_predictions(predicted: &[u8], truth: &[u8]) -> Result<Self> {
        let confusion = ConfusionCounts::from_predictions(predicted, truth)?;
        let tp = confusion.true_positives as f64;

        let ratio = |num: f64, den: usize| if den == 0 { 0.0 } else { num / den as f64 };
        let accuracy = ratio(
            (confusion.true_positives + confusion.true_negatives) as f64,
            confusion.total(),
        );
        let precision = ratio(tp, confusion.true_positives + confusion.false_positives);
        let recall = ratio(tp, confusion.actual_positives());
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            confusion,
            accuracy,
            precision,
            recall,
            f1,
        })
    }
}
