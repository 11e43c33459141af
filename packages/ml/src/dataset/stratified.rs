//! Stratified holdout split

use crate::error::{ModelError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Row indices of the two partitions, each ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub(crate) fn group_by_class(targets: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, class) in targets.iter().enumerate() {
        buckets.entry(*class).or_default().push(row);
    }
    buckets
}

/// Split rows so each class keeps roughly `test_size` of its rows in the
/// test partition. Every class with at least two rows lands in both
/// partitions; singleton classes stay in training.
pub fn stratified_split(targets: &[usize], test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ModelError::InvalidParameter(format!(
            "test_size must be within (0, 1), got {test_size}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_class, mut rows) in group_by_class(targets) {
        rows.shuffle(&mut rng);
        let n_test = if rows.len() < 2 {
            0
        } else {
            ((rows.len() as f64 * test_size).round() as usize).clamp(1, rows.len() - 1)
        };
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(ModelError::InvalidParameter(format!(
            "test_size {test_size} leaves an empty partition for {} rows",
            targets.len()
        )));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}
