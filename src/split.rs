//! Deterministic, label-stratified train/test partitioning

use crate::error::{PipelineError, Result};
use crate::types::dataset::Dataset;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Train/test partition of one dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
    /// Source row indices of the training subset, ascending
    pub train_indices: Vec<usize>,
    /// Source row indices of the test subset, ascending
    pub test_indices: Vec<usize>,
}

/// Partition `dataset` into train and test subsets.
///
/// The test subset holds `ceil((1 - train_fraction) * n)` rows. Each class
/// contributes to it in proportion to its frequency, but the training subset
/// always keeps at least one row of each class, since the classifier needs
/// both. Rows are drawn with a ChaCha8 generator seeded from `seed`.
pub fn train_test_split(dataset: &Dataset, train_fraction: f64, seed: u64) -> Result<Split> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(PipelineError::Config(format!(
            "train fraction must be in (0, 1), got {}",
            train_fraction
        )));
    }

    let n = dataset.n_rows();
    if n < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "{} row(s); at least 2 are needed to form train and test subsets",
            n
        )));
    }

    // epsilon absorbs representation error, e.g. (1 - 0.8) * 10 = 1.9999999999999996
    let n_test = (((1.0 - train_fraction) * n as f64) - 1e-9).ceil().max(1.0) as usize;
    if n_test >= n {
        return Err(PipelineError::InsufficientData(format!(
            "{} rows leave no training rows at train fraction {}",
            n, train_fraction
        )));
    }

    let (mut negatives, mut positives): (Vec<usize>, Vec<usize>) =
        (0..n).partition(|&i| dataset.labels[i] == 0);

    if positives.is_empty() || negatives.is_empty() {
        return Err(PipelineError::InsufficientData(format!(
            "label column holds a single class ({} fraud, {} genuine); training needs both",
            positives.len(),
            negatives.len()
        )));
    }

    let (test_pos, test_neg) = allocate_test_rows(n_test, positives.len(), negatives.len())?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    negatives.shuffle(&mut rng);
    positives.shuffle(&mut rng);

    let mut test_indices: Vec<usize> = negatives[..test_neg]
        .iter()
        .chain(positives[..test_pos].iter())
        .copied()
        .collect();
    let mut train_indices: Vec<usize> = negatives[test_neg..]
        .iter()
        .chain(positives[test_pos..].iter())
        .copied()
        .collect();
    test_indices.sort_unstable();
    train_indices.sort_unstable();

    debug!(
        seed,
        train = train_indices.len(),
        test = test_indices.len(),
        test_fraud = test_pos,
        "Dataset split"
    );

    Ok(Split {
        train: dataset.select_rows(&train_indices),
        test: dataset.select_rows(&test_indices),
        train_indices,
        test_indices,
    })
}

/// Number of fraud and genuine rows to place in the test subset.
fn allocate_test_rows(n_test: usize, positives: usize, negatives: usize) -> Result<(usize, usize)> {
    let n = positives + negatives;
    let proportional = (n_test as f64 * positives as f64 / n as f64).round() as usize;

    let mut test_pos = proportional.min(positives - 1).min(n_test);
    let mut test_neg = n_test - test_pos;
    if test_neg > negatives - 1 {
        test_neg = negatives - 1;
        test_pos = n_test - test_neg;
        if test_pos > positives - 1 {
            return Err(PipelineError::InsufficientData(format!(
                "{} rows cannot leave both classes in the training subset",
                n
            )));
        }
    }

    Ok((test_pos, test_neg))
}
